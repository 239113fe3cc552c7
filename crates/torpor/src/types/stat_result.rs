//! Interpreter-side behavior of [`StatResult`]: named-field access, tuple
//! indexing, and repr.

use crate::{os::StatResult, types::str::float_repr, value::Value};

/// Field names in tuple position order.
pub(crate) const STAT_FIELDS: [&str; 10] = [
    "st_mode", "st_ino", "st_dev", "st_nlink", "st_uid", "st_gid", "st_size", "st_atime", "st_mtime", "st_ctime",
];

impl StatResult {
    /// Field value at a tuple position, if in range.
    #[must_use]
    pub(crate) fn get_index(&self, index: usize) -> Option<Value> {
        let value = match index {
            0 => Value::Int(self.st_mode),
            1 => Value::Int(self.st_ino),
            2 => Value::Int(self.st_dev),
            3 => Value::Int(self.st_nlink),
            4 => Value::Int(self.st_uid),
            5 => Value::Int(self.st_gid),
            6 => Value::Int(self.st_size),
            7 => Value::Float(self.st_atime),
            8 => Value::Float(self.st_mtime),
            9 => Value::Float(self.st_ctime),
            _ => return None,
        };
        Some(value)
    }

    /// Field value by `st_*` name, if it is one.
    #[must_use]
    pub(crate) fn get_field(&self, name: &str) -> Option<Value> {
        let index = STAT_FIELDS.iter().position(|&field| field == name)?;
        self.get_index(index)
    }

    /// All ten field values in order.
    #[must_use]
    pub(crate) fn values(&self) -> Vec<Value> {
        (0..10).map(|i| self.get_index(i).expect("index in range")).collect()
    }

    /// `repr()` naming every field.
    #[must_use]
    pub(crate) fn repr(&self) -> String {
        let mut out = String::from("StatResult(");
        for (position, name) in STAT_FIELDS.iter().enumerate() {
            if position > 0 {
                out.push_str(", ");
            }
            out.push_str(name);
            out.push('=');
            match self.get_index(position) {
                Some(Value::Int(i)) => out.push_str(&i.to_string()),
                Some(Value::Float(f)) => out.push_str(&float_repr(f)),
                _ => unreachable!("stat fields are int or float"),
            }
        }
        out.push(')');
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::{object::Object, os::file_stat};

    #[test]
    fn index_and_field_agree() {
        let Object::StatResult(stat) = file_stat(1024, 0o644, 3.5) else {
            panic!("expected StatResult");
        };
        assert_eq!(stat.get_index(6), stat.get_field("st_size"));
        assert_eq!(stat.get_index(0), stat.get_field("st_mode"));
        assert_eq!(stat.get_index(8), stat.get_field("st_mtime"));
        assert!(stat.get_index(10).is_none());
        assert!(stat.get_field("st_nothing").is_none());
    }

    #[test]
    fn repr_lists_all_fields() {
        let Object::StatResult(stat) = file_stat(10, 0o644, 0.0) else {
            panic!("expected StatResult");
        };
        let repr = stat.repr();
        assert!(repr.starts_with("StatResult(st_mode="));
        assert!(repr.contains("st_size=10"));
        assert!(repr.contains("st_mtime=0.0"));
        assert!(repr.ends_with(')'));
    }
}
