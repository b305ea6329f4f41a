//! Tag-path field extraction.
//!
//! A path is a list of local tag names. Each hop searches all descendants of
//! the current element, depth-first in document order. Missing tags are not
//! errors: optional BAG fields simply come back as `None`.

use serde::{Deserialize, Serialize};

use super::Element;

/// Separator used when several matches are joined into one value.
pub const MULTI_SEPARATOR: char = '\t';

/// How a field is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    /// First match of the last tag of the path, searched directly from the root
    Field,
    /// All matches of the last tag, tab-joined
    FieldMulti,
    /// First match at every hop of the path
    Nested,
    /// Every match at every hop, flattened and tab-joined
    NestedMulti,
    /// Mode name not known to this version; the field is nulled
    #[serde(other)]
    Unrecognized,
}

/// Look up a single field.
///
/// Returns `None` for [`ExtractMode::Unrecognized`]; callers are expected to
/// report that case themselves.
pub fn extract<S: AsRef<str>>(root: &Element, path: &[S], mode: ExtractMode) -> Option<String> {
    match mode {
        ExtractMode::Field => find_first(root, path.last().map(std::slice::from_ref)?),
        ExtractMode::FieldMulti => find_all(root, path.last().map(std::slice::from_ref)?),
        ExtractMode::Nested => find_first(root, path),
        ExtractMode::NestedMulti => find_all(root, path),
        ExtractMode::Unrecognized => None,
    }
}

/// Text of the first match, following only the first match at every hop.
pub fn find_first<S: AsRef<str>>(root: &Element, path: &[S]) -> Option<String> {
    let (head, rest) = path.split_first()?;
    let found = root.descendants_named(head.as_ref()).next()?;
    if rest.is_empty() {
        non_empty(found.text())
    } else {
        find_first(found, rest)
    }
}

/// Tab-joined text of every leaf reachable through every matching intermediate.
pub fn find_all<S: AsRef<str>>(root: &Element, path: &[S]) -> Option<String> {
    let mut values = Vec::new();
    collect_all(root, path, &mut values);
    if values.is_empty() {
        None
    } else {
        Some(values.join(&MULTI_SEPARATOR.to_string()))
    }
}

fn collect_all<'a, S: AsRef<str>>(element: &'a Element, path: &[S], out: &mut Vec<&'a str>) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    for found in element.descendants_named(head.as_ref()) {
        if rest.is_empty() {
            if !found.text().is_empty() {
                out.push(found.text());
            }
        } else {
            collect_all(found, rest, out);
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Element {
        Element::parse(
            r#"<Verblijfsobject>
                 <identificatie>V1</identificatie>
                 <heeftAlsHoofdadres><NummeraanduidingRef>N1</NummeraanduidingRef></heeftAlsHoofdadres>
                 <heeftAlsNevenadres>
                   <NummeraanduidingRef>N2</NummeraanduidingRef>
                   <NummeraanduidingRef>N3</NummeraanduidingRef>
                 </heeftAlsNevenadres>
                 <heeftAlsNevenadres>
                   <NummeraanduidingRef>N4</NummeraanduidingRef>
                   <NummeraanduidingRef>N5</NummeraanduidingRef>
                 </heeftAlsNevenadres>
                 <gebruiksdoel>woonfunctie</gebruiksdoel>
                 <gebruiksdoel>kantoorfunctie</gebruiksdoel>
                 <maaktDeelUitVan><PandRef>P1</PandRef><PandRef>P2</PandRef></maaktDeelUitVan>
               </Verblijfsobject>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_field_first_match() {
        assert_eq!(
            extract(&unit(), &["identificatie"], ExtractMode::Field),
            Some("V1".to_string())
        );
        // Field searches all descendants, so the first reference wins
        assert_eq!(
            extract(&unit(), &["NummeraanduidingRef"], ExtractMode::Field),
            Some("N1".to_string())
        );
    }

    #[test]
    fn test_field_multi_joins_with_tabs() {
        assert_eq!(
            extract(&unit(), &["gebruiksdoel"], ExtractMode::FieldMulti),
            Some("woonfunctie\tkantoorfunctie".to_string())
        );
        assert_eq!(
            extract(&unit(), &["PandRef"], ExtractMode::FieldMulti),
            Some("P1\tP2".to_string())
        );
    }

    #[test]
    fn test_nested_follows_path() {
        assert_eq!(
            extract(
                &unit(),
                &["heeftAlsHoofdadres", "NummeraanduidingRef"],
                ExtractMode::Nested
            ),
            Some("N1".to_string())
        );
        assert_eq!(
            extract(
                &unit(),
                &["heeftAlsNevenadres", "NummeraanduidingRef"],
                ExtractMode::Nested
            ),
            Some("N2".to_string())
        );
    }

    #[test]
    fn test_nested_multi_flattens_repeated_intermediates() {
        assert_eq!(
            extract(
                &unit(),
                &["heeftAlsNevenadres", "NummeraanduidingRef"],
                ExtractMode::NestedMulti
            ),
            Some("N2\tN3\tN4\tN5".to_string())
        );
    }

    #[test]
    fn test_missing_tags_are_absent() {
        let unit = unit();
        assert_eq!(extract(&unit, &["oppervlakte"], ExtractMode::Field), None);
        assert_eq!(extract(&unit, &["oppervlakte"], ExtractMode::FieldMulti), None);
        assert_eq!(
            extract(&unit, &["heeftAlsHoofdadres", "PandRef"], ExtractMode::Nested),
            None
        );
        assert_eq!(
            extract(&unit, &["geen", "NummeraanduidingRef"], ExtractMode::NestedMulti),
            None
        );
        let empty: [&str; 0] = [];
        assert_eq!(extract(&unit, &empty, ExtractMode::Field), None);
    }

    #[test]
    fn test_unrecognized_mode_is_absent() {
        assert_eq!(
            extract(&unit(), &["identificatie"], ExtractMode::Unrecognized),
            None
        );
    }

    #[test]
    fn test_unknown_mode_name_deserializes_as_unrecognized() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: ExtractMode,
        }
        let w: Wrapper = toml::from_str(r#"mode = "find_everything""#).unwrap();
        assert_eq!(w.mode, ExtractMode::Unrecognized);
        let w: Wrapper = toml::from_str(r#"mode = "nested_multi""#).unwrap();
        assert_eq!(w.mode, ExtractMode::NestedMulti);
    }
}
