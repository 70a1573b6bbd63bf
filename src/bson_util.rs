use std::convert::TryFrom;

use crate::{
    bson::{Bson, Document},
    checked::Checked,
    error::{ErrorKind, Result},
};

/// Coerce numeric types into an `i64` if it would be lossless to do so. If this Bson is not numeric
/// or the conversion would be lossy (e.g. 1.5 -> 1), this returns `None`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn get_int(val: &Bson) -> Option<i64> {
    match *val {
        Bson::Int32(i) => Some(i64::from(i)),
        Bson::Int64(i) => Some(i),
        Bson::Double(f) if (f - (f as i64 as f64)).abs() <= f64::EPSILON => Some(f as i64),
        _ => None,
    }
}

/// Coerce numeric types into an `u64` if it would be lossless to do so. If this Bson is not numeric
/// or the conversion would be lossy (e.g. 1.5 -> 1), this returns `None`.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn get_u64(val: &Bson) -> Option<u64> {
    match *val {
        Bson::Int32(i) => u64::try_from(i).ok(),
        Bson::Int64(i) => u64::try_from(i).ok(),
        Bson::Double(f) if (f - (f as u64 as f64)).abs() <= f64::EPSILON => Some(f as u64),
        _ => None,
    }
}

pub(crate) fn first_key(document: &Document) -> Option<&str> {
    document.keys().next().map(String::as_str)
}

pub(crate) fn replacement_document_check(replacement: &Document) -> Result<()> {
    match first_key(replacement) {
        Some(key) if key.starts_with('$') => Err(ErrorKind::InvalidArgument {
            message: "replace document must have first key not starting with '$'".to_string(),
        }
        .into()),
        _ => Ok(()),
    }
}

pub(crate) fn update_document_check(update: &Document) -> Result<()> {
    match first_key(update) {
        Some(s) if s.starts_with('$') => Ok(()),
        _ => Err(ErrorKind::InvalidArgument {
            message: "update document must have first key starting with '$'".to_string(),
        }
        .into()),
    }
}

/// The serialized size of the given document in bytes.
pub(crate) fn doc_size_bytes(document: &Document) -> Result<usize> {
    let mut bytes = Vec::new();
    document.to_writer(&mut bytes)?;
    Ok(bytes.len())
}

/// Returns the document's `_id`, generating one with `generate` and inserting it as the first
/// field if the document does not have one.
pub(crate) fn get_or_prepend_id_field(
    document: &mut Document,
    generate: impl FnOnce() -> Bson,
) -> Bson {
    if let Some(id) = document.get("_id") {
        return id.clone();
    }
    let id = generate();
    let mut with_id = Document::new();
    with_id.insert("_id", id.clone());
    with_id.extend(std::mem::take(document));
    *document = with_id;
    id
}

/// The size in bytes of the provided document's entry in a BSON array at the given index.
pub(crate) fn array_entry_size_bytes(index: usize, doc_len: usize) -> Result<usize> {
    //   * type (1 byte)
    //   * number of decimal digits in key
    //   * null terminator for the key (1 byte)
    //   * size of value

    (Checked::new(1usize) + num_decimal_digits(index) + 1 + doc_len).get()
}

/// The number of digits in `n` in base 10.
/// Useful for calculating the size of an array entry in BSON.
pub(crate) fn num_decimal_digits(mut n: usize) -> usize {
    let mut digits = 0;

    loop {
        n /= 10;
        digits += 1;

        if n == 0 {
            return digits;
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{
        bson::{doc, oid::ObjectId, Bson},
        bson_util::{
            array_entry_size_bytes,
            doc_size_bytes,
            get_or_prepend_id_field,
            num_decimal_digits,
            replacement_document_check,
            update_document_check,
        },
    };

    #[test]
    fn num_digits() {
        assert_eq!(num_decimal_digits(0), 1);
        assert_eq!(num_decimal_digits(1), 1);
        assert_eq!(num_decimal_digits(10), 2);
        assert_eq!(num_decimal_digits(15), 2);
        assert_eq!(num_decimal_digits(100), 3);
        assert_eq!(num_decimal_digits(125), 3);
    }

    #[test]
    fn sizes() {
        // int32 length + type byte + "a\0" + int32 value + trailing null
        assert_eq!(doc_size_bytes(&doc! { "a": 1 }).unwrap(), 12);
        assert_eq!(doc_size_bytes(&doc! {}).unwrap(), 5);
        assert_eq!(array_entry_size_bytes(0, 12).unwrap(), 15);
        assert_eq!(array_entry_size_bytes(10, 12).unwrap(), 16);
    }

    #[test]
    fn id_is_prepended_once() {
        let mut document = doc! { "x": 1 };
        let oid = ObjectId::new();
        let id = get_or_prepend_id_field(&mut document, || Bson::ObjectId(oid));
        assert_eq!(id, Bson::ObjectId(oid));
        assert_eq!(document.keys().next().map(String::as_str), Some("_id"));

        let again = get_or_prepend_id_field(&mut document, || Bson::Int32(5));
        assert_eq!(again, Bson::ObjectId(oid));
        assert_eq!(document.len(), 2);
    }

    #[test]
    fn modification_checks() {
        assert!(update_document_check(&doc! { "$set": { "a": 1 } }).is_ok());
        assert!(update_document_check(&doc! { "a": 1 }).is_err());
        assert!(update_document_check(&doc! {}).is_err());
        assert!(replacement_document_check(&doc! { "a": 1 }).is_ok());
        assert!(replacement_document_check(&doc! {}).is_ok());
        assert!(replacement_document_check(&doc! { "$set": { "a": 1 } }).is_err());
    }
}
