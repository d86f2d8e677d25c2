use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        SvmError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(SvmError::config("x").to_string().contains("config error:"));
    assert!(
        SvmError::internal("x")
            .to_string()
            .contains("internal error:")
    );
    assert_eq!(SvmError::Cancelled.to_string(), "compilation cancelled");
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = SvmError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
