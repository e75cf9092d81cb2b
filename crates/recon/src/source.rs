use std::collections::BTreeMap;

use crate::error::SourceError;
use crate::model::Record;

/// Named query parameters, already rendered to text.
pub type Params = BTreeMap<String, String>;

/// Anything that can answer a query with records.
///
/// Implementations lower-case field names when they build records. Retries
/// and timeouts are the implementation's business; the engine treats each
/// call as blocking and fallible.
pub trait DataSource {
    /// Short name used in logs and error messages.
    fn label(&self) -> &str;

    /// Run `query` (placeholders already substituted) and return every row.
    fn execute(&self, query: &str, params: &Params) -> Result<Vec<Record>, SourceError>;

    fn test_connection(&self) -> bool;

    fn close(&mut self);
}

/// Substitute `{name}` placeholders by plain string replacement. Unknown
/// placeholders are left in place.
pub fn render_query(template: &str, params: &Params) -> String {
    let mut out = template.to_string();
    for (name, value) in params {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_replaced_textually() {
        let params = Params::from([
            ("table".to_string(), "contract".to_string()),
            ("branch".to_string(), "001".to_string()),
        ]);
        assert_eq!(
            render_query("SELECT * FROM {table} WHERE branch = '{branch}' AND x = '{table}'", &params),
            "SELECT * FROM contract WHERE branch = '001' AND x = 'contract'"
        );
    }

    #[test]
    fn unknown_placeholder_survives() {
        assert_eq!(render_query("SELECT {missing}", &Params::new()), "SELECT {missing}");
    }
}
