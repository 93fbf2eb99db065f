use super::*;

#[derive(Default)]
struct RecordingSurface {
    presented: Vec<(JobId, PathBuf)>,
    failures: Vec<(JobId, String)>,
}

impl PlaybackSurface for RecordingSurface {
    fn present(&mut self, job: JobId, report: &JobReport) {
        self.presented.push((job, report.output_path.clone()));
    }

    fn report_failure(&mut self, job: JobId, error: &ReframeError) {
        self.failures.push((job, error.to_string()));
    }
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target/job_unit").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn config_json_fills_defaults() {
    let json = r#"{ "source_path": "in.mov", "output_dir": "out" }"#;
    let cfg: ReframeConfig = serde_json::from_str(json).unwrap();
    assert_eq!(cfg, ReframeConfig::new("in.mov", "out"));
    assert_eq!(cfg.render_size, RenderSize::new(312, 424).unwrap());
    assert_eq!(cfg.crop_height, 1920);
    assert_eq!(cfg.output_path(), PathBuf::from("out").join("video.mp4"));
    cfg.validate().unwrap();
}

#[test]
fn config_from_path_reports_bad_files() {
    let dir = scratch_dir("config");
    let bad = dir.join("bad.json");
    std::fs::write(&bad, b"{ not json").unwrap();
    assert!(ReframeConfig::from_path(&bad).unwrap_err().is_configuration());

    let missing = dir.join("missing.json");
    let err = ReframeConfig::from_path(&missing).unwrap_err();
    assert!(matches!(err, ReframeError::Other(_)));

    let good = dir.join("good.json");
    std::fs::write(
        &good,
        br#"{ "source_path": "a.mp4", "output_dir": "o", "writer_queue_depth": 2 }"#,
    )
    .unwrap();
    assert_eq!(ReframeConfig::from_path(&good).unwrap().writer_queue_depth, 2);
}

#[test]
fn config_validation_rejects_bad_values() {
    let base = ReframeConfig::new("in.mov", "out");

    let mut c = base.clone();
    c.render_size = RenderSize {
        width: 311,
        height: 424,
    };
    assert!(c.validate().is_err());

    let mut c = base.clone();
    c.crop_height = 0;
    assert!(c.validate().is_err());

    let mut c = base.clone();
    c.writer_queue_depth = 0;
    assert!(c.validate().is_err());

    let mut c = base;
    c.output_file_name = "nested/video.mp4".to_string();
    assert!(c.validate().is_err());
}

#[test]
fn queue_depth_override_parsing() {
    assert_eq!(queue_depth_override(Some("8".to_string())), Some(8));
    assert_eq!(queue_depth_override(Some(" 3 ".to_string())), Some(3));
    assert_eq!(queue_depth_override(Some("0".to_string())), None);
    assert_eq!(queue_depth_override(Some("many".to_string())), None);
    assert_eq!(queue_depth_override(None), None);
}

#[test]
fn zero_crop_width_is_rejected_and_output_untouched() {
    let dir = scratch_dir("zero_crop");
    let out = dir.join("video.mp4");
    std::fs::write(&out, b"previous").unwrap();

    let reframer = Reframer::new(ReframeConfig::new(dir.join("missing.mov"), &dir)).unwrap();
    let err = reframer.start(0).unwrap_err();
    assert!(err.is_configuration());
    assert!(!reframer.is_busy());
    assert_eq!(std::fs::read(&out).unwrap(), b"previous");
}

#[test]
fn failed_setup_releases_the_job_slot() {
    let dir = scratch_dir("missing_source");
    let reframer = Reframer::new(ReframeConfig::new(dir.join("missing.mov"), &dir)).unwrap();
    assert!(reframer.start(500).unwrap_err().is_configuration());
    assert!(!reframer.is_busy());
    // A second attempt fails for the same reason, not because of a stale slot.
    assert!(reframer.start(500).unwrap_err().is_configuration());
}

#[test]
fn job_slot_is_exclusive() {
    let flag = Arc::new(AtomicBool::new(false));
    let first = SlotGuard::acquire(&flag).unwrap();
    let err = SlotGuard::acquire(&flag).err().unwrap();
    assert!(matches!(err, ReframeError::Busy(_)));
    drop(first);
    assert!(SlotGuard::acquire(&flag).is_ok());
}

#[test]
fn dispatch_routes_events_to_the_surface() {
    let dir = scratch_dir("dispatch");
    let reframer = Reframer::new(ReframeConfig::new(dir.join("in.mov"), &dir)).unwrap();
    reframer
        .events_tx
        .send(JobEvent {
            job: JobId(1),
            result: Ok(JobReport {
                output_path: dir.join("video.mp4"),
                frames_written: 3,
                decode_error: None,
            }),
        })
        .unwrap();
    reframer
        .events_tx
        .send(JobEvent {
            job: JobId(2),
            result: Err(ReframeError::encode("finalize failed")),
        })
        .unwrap();

    let mut surface = RecordingSurface::default();
    assert_eq!(reframer.dispatch_events(&mut surface), 2);
    assert_eq!(surface.presented, vec![(JobId(1), dir.join("video.mp4"))]);
    assert_eq!(surface.failures.len(), 1);
    assert_eq!(surface.failures[0].0, JobId(2));
    assert_eq!(reframer.dispatch_events(&mut surface), 0);
    assert!(reframer.wait_event(Duration::from_millis(10)).is_none());
}

#[test]
fn output_that_would_replace_the_source_is_rejected() {
    let dir = scratch_dir("source_collision");
    for name in ["video.mp4", "video.MP4"] {
        let source = dir.join(name);
        std::fs::write(&source, b"bundled clip").unwrap();

        let reframer = Reframer::new(ReframeConfig::new(&source, &dir)).unwrap();
        let err = reframer.start(500).unwrap_err();
        assert!(err.is_configuration(), "{err}");
        assert!(err.to_string().contains("overwrite the source"));
        assert!(!reframer.is_busy());
        assert_eq!(std::fs::read(&source).unwrap(), b"bundled clip");

        std::fs::remove_file(&source).unwrap();
    }
}

#[test]
fn collision_check_compares_directory_and_name() {
    let dir = scratch_dir("collision_helper");
    let other = scratch_dir("collision_helper_other");
    let source = dir.join("clip.mov");
    std::fs::write(&source, b"x").unwrap();

    assert!(output_collides_with_source(&source, &dir.join("clip.mov")));
    assert!(output_collides_with_source(&source, &dir.join("CLIP.MOV")));
    assert!(!output_collides_with_source(&source, &dir.join("video.mp4")));
    assert!(!output_collides_with_source(&source, &other.join("clip.mov")));
    assert!(!output_collides_with_source(&dir.join("missing.mov"), &dir.join("missing.mov")));
}
