use super::*;

#[test]
fn test_rfc_rto_doubles_to_cap() {
    let p = BackOffPattern::rfc_rto();
    assert_eq!(p.next_interval(1), Some(Duration::from_millis(500)));
    assert_eq!(p.next_interval(2), Some(Duration::from_millis(1000)));
    assert_eq!(p.next_interval(3), Some(Duration::from_millis(2000)));
    assert_eq!(p.next_interval(4), Some(Duration::from_millis(4000)));
    assert_eq!(p.next_interval(5), Some(Duration::from_millis(8000)));
    // capped
    assert_eq!(p.next_interval(6), Some(Duration::from_millis(8000)));
    // attempt budget spent
    assert_eq!(p.next_interval(7), None);
}

#[test]
fn test_explicit_pattern_then_extension() {
    let p = BackOffPattern::new(
        vec![
            Duration::from_millis(100),
            Duration::from_millis(300),
            Duration::from_millis(900),
        ],
        3,
        Duration::from_secs(10),
        6,
    );
    assert_eq!(p.next_interval(1), Some(Duration::from_millis(100)));
    assert_eq!(p.next_interval(3), Some(Duration::from_millis(900)));
    assert_eq!(p.next_interval(4), Some(Duration::from_millis(2700)));
    assert_eq!(p.next_interval(5), Some(Duration::from_millis(8100)));
    assert_eq!(p.next_interval(6), None);
}

#[test]
fn test_fixed_pattern() {
    let p = BackOffPattern::fixed(Duration::from_millis(20), 3);
    assert_eq!(p.next_interval(1), Some(Duration::from_millis(20)));
    assert_eq!(p.next_interval(2), Some(Duration::from_millis(20)));
    assert_eq!(p.next_interval(3), None);
}
