//! Integration coverage for loading `RunConfig` from a YAML file on disk.

use chatbench::config::RunConfig;
use std::io::Write;

#[test]
fn loads_and_validates_a_yaml_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "endpoint: http://localhost:9000\n\
         model: demo-model\n\
         experiment_name: file-loaded-run\n\
         num_runners: 4\n\
         num_tasks: 10\n\
         no_sign: true\n"
    )
    .unwrap();

    let config = RunConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.endpoint, "http://localhost:9000");
    assert_eq!(config.num_runners, 4);
    config.validate_bounded().unwrap();
}

#[test]
fn missing_file_surfaces_a_config_error() {
    let result = RunConfig::from_yaml_file("/nonexistent/path/does-not-exist.yaml");
    assert!(result.is_err());
}
