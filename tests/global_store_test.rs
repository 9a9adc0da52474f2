mod common;

use common::*;
use signlens::{global_store, predict_sign, ClassifierError};

// One test per binary: the process-wide store reads MODEL_PATH on every attempt
#[test]
fn test_global_store_follows_environment() {
    init_logging();
    std::env::remove_var("MODEL_PATH");
    std::env::remove_var("MODEL_SHA256");

    let err = predict_sign(&[0.0; 42]).unwrap_err();
    assert_eq!(err, ClassifierError::ConfigError("MODEL_PATH environment variable is not set".into()));
    assert!(!global_store().is_loaded());

    let file = write_logistic_bundle(25);
    std::env::set_var("MODEL_PATH", file.path());
    let prediction = predict_sign(&[0.0; 42]).unwrap();
    assert_eq!(prediction.label, "Z");
    assert!(global_store().is_loaded());
    assert_eq!(global_store().load_attempts(), 2);

    // Once loaded the environment is no longer consulted
    std::env::remove_var("MODEL_PATH");
    assert_eq!(predict_sign(&[0.0; 42]).unwrap().label, "Z");
}
