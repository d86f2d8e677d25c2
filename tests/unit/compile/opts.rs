use super::*;

#[test]
fn defaults_are_valid() {
    let o = CompilerOpts::default();
    o.validate().unwrap();
    assert_eq!(o.stack_size, 255);
    assert_eq!(o.max_closures, 64);
    assert!(o.parallel);
    assert_eq!(o.threads, None);
}

#[test]
fn json_fills_missing_fields_from_defaults() {
    let o = CompilerOpts::from_json(r#"{ "stack_size": 32, "threads": 2 }"#).unwrap();
    assert_eq!(o.stack_size, 32);
    assert_eq!(o.threads, Some(2));
    assert_eq!(o.max_closures, 64);
    assert_eq!(o.stack_capacity(), 32);
}

#[test]
fn out_of_range_values_are_config_errors() {
    for json in [
        r#"{ "stack_size": 0 }"#,
        r#"{ "stack_size": 70000 }"#,
        r#"{ "threads": 0 }"#,
        r#"{ "max_closures": 0 }"#,
        r#"{ "stack_size": "big" }"#,
    ] {
        let err = CompilerOpts::from_json(json).unwrap_err();
        assert!(matches!(err, SvmError::Config(_)), "{json}: {err}");
    }
}
