//! Process-wide certificate verification installs

use hwmetrics_core::tls::install_certificate_verification;
use hwmetrics_core::{GlobalTrustPolicy, ResolvedConfig, SettingsMap, TrustPolicy, TrustPolicySink};
use serial_test::serial;

#[test]
#[serial]
fn test_install_certificate_verification() {
    let current = GlobalTrustPolicy::current();

    install_certificate_verification("true", None, &GlobalTrustPolicy).unwrap();
    assert_eq!(GlobalTrustPolicy::current(), current);

    install_certificate_verification("false", None, &GlobalTrustPolicy).unwrap();
    assert_ne!(GlobalTrustPolicy::current(), current);
    let accept_all = GlobalTrustPolicy::current();

    let dir = tempfile::tempdir().unwrap();
    let cert_path = dir.path().join("influxdb-selfsigned.crt");
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .unwrap()
        .cert;
    std::fs::write(&cert_path, cert.pem()).unwrap();

    install_certificate_verification(cert_path.to_str().unwrap(), None, &GlobalTrustPolicy)
        .unwrap();
    assert_ne!(GlobalTrustPolicy::current(), current);
    assert_ne!(GlobalTrustPolicy::current(), accept_all);

    GlobalTrustPolicy.install(TrustPolicy::SystemDefault);
}

#[test]
#[serial]
fn test_resolved_config_installs_globally() {
    GlobalTrustPolicy.install(TrustPolicy::SystemDefault);

    let settings = SettingsMap::from_pairs([
        ("prometheus.port", "9182"),
        ("certificate-verification", "False"),
    ]);
    let config = ResolvedConfig::from_settings(&settings).unwrap();

    assert!(config.prometheus().is_some());
    assert_eq!(*GlobalTrustPolicy::current(), TrustPolicy::AcceptAll);

    GlobalTrustPolicy.install(TrustPolicy::SystemDefault);
}
