//! Matrix parameter compiler
//!
//! Turns a decoded path plus a map of `path prefix -> key -> values` into a
//! percent-encoded wire path where every registered prefix carries its own
//! `;key=value` fragments, e.g. `/folder;rev=3/file.txt`.

use std::collections::BTreeMap;

use super::encoding::{quote_plus, quote_segment};

/// Parameters keyed by the full decoded path prefix they attach to
pub type MatrixParams = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Compile `path` and `matrix_params` into a quoted URI path.
///
/// A prefix only picks up parameters when it equals a registered key exactly.
/// Keys inside a prefix come out in sorted order and every value of a key
/// gets its own fragment. Segments that carry parameters are form-encoded
/// (`~` becomes `%7E`, space becomes `+`); plain segments use RFC 3986 path
/// encoding.
pub fn quote_path_with_matrix_params(path: &str, matrix_params: Option<&MatrixParams>) -> String {
    let mut names: Vec<&str> = Vec::new();
    let mut components: Vec<String> = Vec::new();

    for name in path.split('/') {
        names.push(name);
        let path_so_far = names.join("/");

        let component = match matrix_params.and_then(|params| params.get(&path_so_far)) {
            Some(params) => {
                let mut component = quote_plus(name);
                for (key, values) in params {
                    for value in values {
                        component.push(';');
                        component.push_str(&quote_plus(key));
                        component.push('=');
                        component.push_str(&quote_plus(value));
                    }
                }
                component
            }
            None => quote_segment(name),
        };
        components.push(component);
    }

    components.join("/")
}
