use std::collections::HashMap;

/// The environment variables the wrapper reads, captured once at startup.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Variables whose name or value is not UTF-8 are left out.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn has_password(&self) -> bool {
        self.vars.contains_key("PGPASSWORD")
    }

    pub fn database(&self) -> Option<&str> {
        self.get("PGDATABASE")
    }

    pub fn host(&self) -> Option<&str> {
        self.get("PGHOST")
    }

    pub fn login_name(&self) -> Option<&str> {
        self.get("USER").or_else(|| self.get("LOGNAME"))
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // only the names, values may hold secrets
        let mut keys = self
            .vars
            .keys()
            .filter(|k| k.starts_with("PG"))
            .map(String::as_str)
            .collect::<Vec<_>>();
        keys.sort_unstable();
        write!(f, "{}", keys.join(","))
    }
}
