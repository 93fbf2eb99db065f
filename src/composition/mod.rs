/// Time-sliced layer instructions for one reframing job.
pub mod model;
