// Integration tests for workpool::config

use std::time::Duration;

use workpool::PoolConfig;

#[test]
fn test_config_defaults() {
    let config = PoolConfig::default();

    assert_eq!(config.workers, num_cpus::get());
    assert_eq!(config.name, "workpool");
    assert_eq!(config.throttle, Duration::ZERO);
    assert_eq!(config.queue_capacity, 0);
}

#[test]
fn test_config_builders() {
    let config = PoolConfig::new(3, "builder")
        .with_throttle(Duration::from_millis(25))
        .with_queue_capacity(64);

    assert_eq!(config.workers, 3);
    assert_eq!(config.name, "builder");
    assert_eq!(config.throttle, Duration::from_millis(25));
    assert_eq!(config.queue_capacity, 64);
}

#[test]
fn test_config_debug_format() {
    let config = PoolConfig::default();
    // Basic check to ensure Debug trait doesn't panic
    assert!(format!("{:?}", config).contains("workers"));
}
