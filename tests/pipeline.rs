use approx::assert_relative_eq;
use gain_iso::app::pipeline::{BATCH_LUT_FILE, run_and_write, run_batch, run_fit};
use gain_iso::data::{SyntheticSpec, write_dataset};
use gain_iso::domain::{FitConfig, FitParameters, SeedStrategy};
use gain_iso::io::lut::read_lut;
use gain_iso::lookup::LUT_ISO_COUNT;
use gain_iso::models::inverse_gain;

fn exact_spec() -> SyntheticSpec {
    SyntheticSpec {
        noise: 0.0,
        missing: vec![200],
        ..SyntheticSpec::default()
    }
}

#[test]
fn synthetic_camera_round_trips_through_fit_and_lookup_table() {
    let dir = tempfile::tempdir().unwrap();
    let camera = dir.path().join("camera");
    let spec = exact_spec();
    write_dataset(&spec, &camera).unwrap();

    let lut_path = dir.path().join("results").join("gain_new").join("LUT.npy");
    let config = FitConfig {
        folder: camera.clone(),
        seeds: SeedStrategy::Initial,
        lut_path: lut_path.clone(),
        export_csv: None,
        export_fit: None,
        plot: false,
        plot_width: 80,
        plot_height: 20,
        plot_xmax: vec![1850.0],
    };
    let run = run_and_write(&config).unwrap();

    assert_eq!(run.ingest.n_missing(), 1);
    assert!(!run.fit.used_isos.contains(&200));
    assert_relative_eq!(run.fit.params.slope, 0.01, max_relative = 1e-8);
    assert_relative_eq!(run.fit.params.offset, 0.2, max_relative = 1e-8);
    assert_relative_eq!(run.fit.params.knee, 300.0, max_relative = 1e-8);
    assert_relative_eq!(run.fit.quality.r_squared.unwrap(), 1.0, epsilon = 1e-12);

    let lut = read_lut(&lut_path).unwrap();
    assert_eq!(lut.len(), LUT_ISO_COUNT);
    assert_eq!(lut, run.lut);

    let truth = FitParameters::new(0.01, 0.2, 300.0);
    for iso in [0_u32, 100, 299, 300, 1999] {
        let gain = lut.gain_at(iso).unwrap();
        assert_relative_eq!(gain.value, 1.0 / inverse_gain(f64::from(iso), &truth), max_relative = 1e-8);
        assert!(gain.error >= 0.0);
    }
}

#[test]
fn midpoint_seeds_give_the_same_answer_on_clean_data() {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(&exact_spec(), dir.path()).unwrap();

    let single = run_fit(dir.path(), SeedStrategy::Initial).unwrap();
    let multi = run_fit(dir.path(), SeedStrategy::Midpoints).unwrap();
    assert_relative_eq!(single.fit.params.knee, multi.fit.params.knee, max_relative = 1e-8);
    assert!(multi.fit.quality.chi2 <= single.fit.quality.chi2 + 1e-12);
}

#[test]
fn batch_keeps_going_after_a_failed_camera() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good");
    let sparse = dir.path().join("sparse");
    write_dataset(&exact_spec(), &good).unwrap();
    write_dataset(
        &SyntheticSpec {
            isos: vec![100, 200, 400],
            missing: vec![400],
            ..exact_spec()
        },
        &sparse,
    )
    .unwrap();

    let results = run_batch(&[good.clone(), sparse.clone()], SeedStrategy::Initial);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, good);
    assert!(results[0].1.is_ok());
    assert!(good.join(BATCH_LUT_FILE).is_file());

    // Only ISO 100 has data (200 and 400 are missing).
    let err = results[1].1.as_ref().unwrap_err();
    assert_eq!(err.exit_code(), 3);
    assert!(!sparse.join(BATCH_LUT_FILE).exists());
}
