use super::*;

#[test]
fn test_float_ordering_total() {
    let mut vals = vec![
        Value::F64(f64::INFINITY),
        Value::F64(-0.0),
        Value::F64(0.0),
        Value::F64(f64::NEG_INFINITY),
        Value::F64(1.5),
        Value::F64(-1.5),
        Value::F64(f64::NAN),
    ];
    vals.sort_by(|a, b| a.cmp_total(b));

    // -inf < -1.5 < -0.0 == 0.0 < 1.5 < +inf < NaN
    assert_eq!(vals[0], Value::F64(f64::NEG_INFINITY));
    assert_eq!(vals[1], Value::F64(-1.5));
    assert_eq!(vals[4], Value::F64(1.5));
    assert_eq!(vals[5], Value::F64(f64::INFINITY));
    assert!(vals[6].cmp_total(&Value::F64(f64::NAN)) == std::cmp::Ordering::Equal);
}

#[test]
fn test_negative_zero_equals_positive_zero() {
    assert_eq!(
        Value::F64(0.0).cmp_total(&Value::F64(-0.0)),
        std::cmp::Ordering::Equal
    );
    assert_eq!(
        Value::F64(-0.0).cmp_total(&Value::F64(0.0)),
        std::cmp::Ordering::Equal
    );
}

#[test]
fn test_bytes_unsigned_lexicographic() {
    let a = Value::Bytes(vec![0x00, 0xff]);
    let b = Value::Bytes(vec![0x01, 0x00]);
    assert_eq!(a.cmp_total(&b), std::cmp::Ordering::Less);
}

#[test]
fn test_direction_reverses() {
    let a = Value::I64(1);
    let b = Value::I64(2);
    assert_eq!(
        a.cmp_directed(&b, Direction::Desc),
        std::cmp::Ordering::Greater
    );
}

#[test]
fn test_primary_key_ordering() {
    let a = PrimaryKey(vec![Value::I64(1), Value::Text("a".into())]);
    let b = PrimaryKey(vec![Value::I64(1), Value::Text("b".into())]);
    assert_eq!(a.cmp_total(&b), std::cmp::Ordering::Less);
}
