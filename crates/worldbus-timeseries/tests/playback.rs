use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_abs_diff_eq;
use serde_json::json;
use tempfile::{TempDir, tempdir};
use worldbus_core::{AdapterError, BufferedAdapter, WorldAdapter};
use worldbus_timeseries::{
    Dataset, Normalization, TimeSeriesConfig, TimeSeriesEngine, TimeSeriesError, TimeSeriesWorld,
    sigmoid,
};

fn write_archive(dir: &Path, body: &serde_json::Value) -> PathBuf {
    let path = dir.join("archive.json");
    fs::write(&path, body.to_string()).expect("write archive");
    path
}

fn small_archive() -> (TempDir, PathBuf) {
    let dir = tempdir().expect("tempdir");
    let path = write_archive(
        dir.path(),
        &json!({
            "data": [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            "ids": [101, "beta"],
            "startdate": "2001-01-01",
            "enddate": "2001-01-03",
        }),
    );
    (dir, path)
}

fn z_only() -> Normalization {
    Normalization {
        z_transform: true,
        clip_and_scale: false,
        sigmoid: false,
    }
}

#[test]
fn archive_loads_from_disk() {
    let (_dir, path) = small_archive();
    let dataset = Dataset::from_path(&path).expect("dataset");
    assert_eq!(dataset.rows(), 2);
    assert_eq!(dataset.columns(), 3);
    assert_eq!(dataset.ids(), &["101", "beta"]);
    assert_eq!(dataset.start(), &json!("2001-01-01"));
    assert_eq!(dataset.column(1), vec![2.0, 5.0]);
}

#[test]
fn malformed_archives_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let missing_ids = write_archive(
        dir.path(),
        &json!({"data": [[1.0]], "startdate": 0, "enddate": 0}),
    );
    assert!(matches!(
        Dataset::from_path(&missing_ids),
        Err(TimeSeriesError::DatasetLoad(_))
    ));

    let ragged = write_archive(
        dir.path(),
        &json!({"data": [[1.0, 2.0], [3.0]], "ids": ["a", "b"], "startdate": 0, "enddate": 0}),
    );
    assert!(matches!(
        Dataset::from_path(&ragged),
        Err(TimeSeriesError::DatasetLoad(_))
    ));

    assert!(matches!(
        Dataset::from_path(dir.path().join("absent.json")),
        Err(TimeSeriesError::Io(_))
    ));
}

#[test]
fn null_cells_survive_normalization_as_undefined() {
    let dataset = Dataset::from_json_str(
        &json!({
            "data": [[1.0, null, 3.0]],
            "ids": ["gap"],
            "startdate": null,
            "enddate": null,
        })
        .to_string(),
    )
    .expect("dataset");
    let config = TimeSeriesConfig {
        shuffle: false,
        normalization: z_only(),
        ..TimeSeriesConfig::default()
    };
    let mut engine = TimeSeriesEngine::load(dataset, &config).expect("engine");
    assert_abs_diff_eq!(engine.advance(1)[0], -1.0, epsilon = 1e-12);
    assert!(engine.advance(2)[0].is_nan());
    assert_abs_diff_eq!(engine.advance(3)[0], 1.0, epsilon = 1e-12);
}

#[test]
fn z_transform_matches_closed_form() {
    let (_dir, path) = small_archive();
    let config = TimeSeriesConfig {
        dataset: Some(path),
        shuffle: false,
        normalization: z_only(),
        rng_seed: None,
    };
    let dataset = Dataset::from_path(config.dataset_path().expect("path")).expect("dataset");
    let mut engine = TimeSeriesEngine::load(dataset, &config).expect("engine");

    let expected = -1.0 / (2.0f64 / 3.0).sqrt();
    let first = engine.advance(1);
    assert_eq!(first.len(), 2);
    for value in first {
        assert_abs_diff_eq!(value, expected, epsilon = 1e-12);
    }
}

#[test]
fn default_normalization_squashes_into_unit_interval() {
    let (_dir, path) = small_archive();
    let config = TimeSeriesConfig {
        dataset: Some(path),
        shuffle: false,
        ..TimeSeriesConfig::default()
    };
    let world = TimeSeriesWorld::from_config(&config).expect("world");
    let playback = world.playback();
    let guard = playback.read().expect("playback");
    let row = guard.engine().dataset().row(0);
    let std = (2.0f64 / 3.0).sqrt();
    assert_abs_diff_eq!(row[0], sigmoid(-1.0 / std), epsilon = 1e-12);
    assert_abs_diff_eq!(row[1], 0.5, epsilon = 1e-12);
    assert!(row.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn flat_and_unbounded_rows_still_publish_unit_values() {
    let dataset = Dataset::from_rows(
        vec![vec![5.0, 5.0, 5.0], vec![1.0, f64::INFINITY, 3.0]],
        vec!["flat".into(), "spike".into()],
        json!(null),
        json!(null),
    )
    .expect("dataset");
    let config = TimeSeriesConfig {
        shuffle: false,
        ..TimeSeriesConfig::default()
    };
    let mut engine = TimeSeriesEngine::load(dataset, &config).expect("engine");
    for step in 1..=3 {
        let observation = engine.advance(step);
        assert!(
            observation.iter().all(|v| (0.0..=1.0).contains(v)),
            "step {step}: {observation:?}"
        );
    }
    assert_abs_diff_eq!(engine.advance(1)[0], sigmoid(5.0), epsilon = 1e-12);
}

#[test]
fn unshuffled_playback_is_deterministic() {
    let (_dir, path) = small_archive();
    let config = TimeSeriesConfig {
        dataset: Some(path),
        shuffle: false,
        normalization: Normalization::none(),
        rng_seed: None,
    };
    let run = || {
        let mut world = TimeSeriesWorld::from_config(&config).expect("world");
        (0..7)
            .map(|_| {
                world.step().expect("step");
                world.state()
            })
            .collect::<Vec<_>>()
    };
    let first = run();
    assert_eq!(first, run());
    assert_eq!(first[0], vec![1.0, 4.0]);
    assert_eq!(first[3], vec![1.0, 4.0]);
    assert_eq!(first[6], vec![1.0, 4.0]);
}

#[test]
fn seeded_shuffle_repeats_and_covers_every_column() {
    let rows = vec![(0..12).map(f64::from).collect::<Vec<_>>()];
    let config = TimeSeriesConfig {
        shuffle: true,
        normalization: Normalization::none(),
        rng_seed: Some(99),
        ..TimeSeriesConfig::default()
    };
    let play = || {
        let dataset = Dataset::from_rows(rows.clone(), vec!["n".into()], json!(null), json!(null))
            .expect("dataset");
        let mut engine = TimeSeriesEngine::load(dataset, &config).expect("engine");
        (1..=12).map(|step| engine.advance(step)[0]).collect::<Vec<_>>()
    };
    let first = play();
    assert_eq!(first, play());
    let mut sorted = first.clone();
    sorted.sort_by(f64::total_cmp);
    assert_eq!(sorted, rows[0]);
}

#[test]
fn missing_dataset_path_is_a_configuration_error() {
    assert!(matches!(
        TimeSeriesWorld::from_config(&TimeSeriesConfig::default()),
        Err(TimeSeriesError::Configuration(_))
    ));
}

#[test]
fn config_file_selects_dataset_and_modes() {
    let (dir, archive) = small_archive();
    let config_path = dir.path().join("config.json");
    fs::write(
        &config_path,
        json!({"dataset": archive, "shuffle": false, "normalization": {"sigmoid": false}})
            .to_string(),
    )
    .expect("write config");
    let config = TimeSeriesConfig::from_path(&config_path).expect("config");
    assert_eq!(config.normalization, z_only());

    fs::write(&config_path, "{\"shuffle\": 3}").expect("write config");
    assert!(matches!(
        TimeSeriesConfig::from_path(&config_path),
        Err(TimeSeriesError::ConfigFile(_))
    ));
}

struct Mortal {
    channels: BufferedAdapter,
    lifetime: u32,
}

impl WorldAdapter for Mortal {
    fn kind(&self) -> &'static str {
        "mortal"
    }

    fn channels(&self) -> &BufferedAdapter {
        &self.channels
    }

    fn channels_mut(&mut self) -> &mut BufferedAdapter {
        &mut self.channels
    }

    fn update_data_sources_and_targets(&mut self) -> Result<(), AdapterError> {
        self.lifetime = self.lifetime.saturating_sub(1);
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.lifetime > 0
    }
}

#[test]
fn world_drops_agents_that_die() {
    let (_dir, path) = small_archive();
    let config = TimeSeriesConfig {
        dataset: Some(path),
        shuffle: false,
        normalization: Normalization::none(),
        rng_seed: None,
    };
    let mut world = TimeSeriesWorld::from_config(&config).expect("world");
    let runner = world.spawn_runner().expect("runner");
    let mortal = world.attach(Box::new(Mortal {
        channels: BufferedAdapter::new(),
        lifetime: 2,
    }));

    let first = world.step().expect("step 1");
    assert_eq!((first.step, first.ticked, first.removed), (1, 2, 0));
    let second = world.step().expect("step 2");
    assert_eq!((second.step, second.ticked, second.removed), (2, 2, 1));
    assert!(world.agent(mortal).is_none());
    assert_eq!(world.agent_count(), 1);

    let third = world.step().expect("step 3");
    assert_eq!(third.removed, 0);
    let sources = world.agent(runner).expect("runner").adapter().channels().all_sources();
    assert_eq!(sources, vec![3.0, 6.0]);
}
