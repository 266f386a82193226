//! Parameter catalog management: key derivation and validated creation.

use crate::models::Parameter;
use crate::storage;
use rusqlite::Connection;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("label must not be empty")]
    EmptyLabel,
    #[error("key '{0}' may only contain lowercase latin letters, digits and '_'")]
    InvalidKey(String),
    #[error("parameter '{0}' already exists")]
    DuplicateKey(String),
    #[error(transparent)]
    Store(#[from] rusqlite::Error),
}

fn transliterate(ch: char) -> Option<&'static str> {
    let latin = match ch {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' | 'ё' | 'э' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "j",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "c",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ы' => "y",
        'ю' => "yu",
        'я' => "ya",
        'ь' | 'ъ' => "",
        _ => return None,
    };
    Some(latin)
}

/// Machine key for a label: Cyrillic is transliterated, everything outside
/// `[a-z0-9_]` collapses into a single `_`, and edge underscores are trimmed.
pub fn slugify(label: &str) -> String {
    let mut raw = String::with_capacity(label.len());
    for ch in label.to_lowercase().chars() {
        match transliterate(ch) {
            Some(latin) => raw.push_str(latin),
            None => raw.push(ch),
        }
    }

    let mut key = String::with_capacity(raw.len());
    let mut pending_gap = false;
    for ch in raw.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            if pending_gap && !key.is_empty() {
                key.push('_');
            }
            pending_gap = false;
            key.push(ch);
        } else {
            pending_gap = true;
        }
    }
    key.trim_matches('_').to_string()
}

pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
}

/// Derives a key for `label` that is not taken yet.
pub fn unique_key(conn: &Connection, label: &str) -> rusqlite::Result<String> {
    let mut base = slugify(label);
    if base.is_empty() {
        base = format!("param_{}", storage::count_parameters(conn)? + 1);
    }

    let mut candidate = base.clone();
    let mut suffix = 2;
    while storage::find_parameter(conn, &candidate)?.is_some() {
        candidate = format!("{base}_{suffix}");
        suffix += 1;
    }
    Ok(candidate)
}

pub fn create_parameter(
    conn: &Connection,
    label: &str,
    key: Option<&str>,
    active: bool,
) -> Result<Parameter, CatalogError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(CatalogError::EmptyLabel);
    }

    let key = match key.map(str::trim).filter(|key| !key.is_empty()) {
        Some(key) => {
            if !is_valid_key(key) {
                return Err(CatalogError::InvalidKey(key.to_string()));
            }
            if storage::find_parameter(conn, key)?.is_some() {
                return Err(CatalogError::DuplicateKey(key.to_string()));
            }
            key.to_string()
        }
        None => unique_key(conn, label)?,
    };

    let parameter = storage::insert_parameter(conn, &key, label, active)?;
    info!("created parameter {} ({})", parameter.key, parameter.label);
    Ok(parameter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_transliterates_cyrillic() {
        assert_eq!(slugify("Головная боль"), "golovnaya_bol");
        assert_eq!(slugify("Щи"), "shchi");
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Sleep -- quality (h) "), "sleep_quality_h");
        assert_eq!(slugify("already_snake"), "already_snake");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn derived_keys_avoid_collisions() {
        let conn = storage::open_in_memory().unwrap();
        create_parameter(&conn, "Mood", None, true).unwrap();
        let second = create_parameter(&conn, "mood", None, true).unwrap();
        let third = create_parameter(&conn, "MOOD!", None, true).unwrap();

        assert_eq!(second.key, "mood_2");
        assert_eq!(third.key, "mood_3");
    }

    #[test]
    fn unsluggable_label_gets_numbered_key() {
        let conn = storage::open_in_memory().unwrap();
        create_parameter(&conn, "Mood", None, true).unwrap();
        let odd = create_parameter(&conn, "☀", None, true).unwrap();
        assert_eq!(odd.key, "param_2");
    }

    #[test]
    fn explicit_keys_are_validated() {
        let conn = storage::open_in_memory().unwrap();
        assert!(matches!(
            create_parameter(&conn, "Mood", Some("Bad Key"), true),
            Err(CatalogError::InvalidKey(_))
        ));
        create_parameter(&conn, "Mood", Some("mood"), true).unwrap();
        assert!(matches!(
            create_parameter(&conn, "Other", Some("mood"), true),
            Err(CatalogError::DuplicateKey(_))
        ));
        assert!(matches!(
            create_parameter(&conn, "  ", None, true),
            Err(CatalogError::EmptyLabel)
        ));
    }
}
