//! Read-only request/environment snapshot used to seed superglobals

use super::array::{Array, ArrayKey};
use super::value::Value;
use crate::config::Config;
use chrono::{DateTime, Utc};

/// What the host knows about the request that started the script
#[derive(Debug, Clone)]
pub struct Request {
    /// Script path followed by its arguments (`$argv`)
    pub argv: Vec<String>,
    pub script_filename: String,
    pub document_root: String,
    /// Process environment variables
    pub env: Vec<(String, String)>,
    pub get: Vec<(String, String)>,
    pub post: Vec<(String, String)>,
    pub cookie: Vec<(String, String)>,
    pub time: DateTime<Utc>,
}

impl Request {
    /// Snapshot for a CLI run: real environment variables, no query data
    pub fn cli(script: &str, args: &[String]) -> Self {
        let mut argv = vec![script.to_string()];
        argv.extend(args.iter().cloned());
        Request {
            argv,
            script_filename: script.to_string(),
            document_root: String::new(),
            env: std::env::vars().collect(),
            get: Vec::new(),
            post: Vec::new(),
            cookie: Vec::new(),
            time: Utc::now(),
        }
    }

    /// Empty snapshot with a fixed clock, for embedding and tests
    pub fn empty(script: &str) -> Self {
        Request {
            argv: vec![script.to_string()],
            script_filename: script.to_string(),
            document_root: String::new(),
            env: Vec::new(),
            get: Vec::new(),
            post: Vec::new(),
            cookie: Vec::new(),
            time: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn pairs(pairs: &[(String, String)]) -> Array {
        pairs
            .iter()
            .map(|(k, v)| (ArrayKey::from_bytes(k.as_bytes()), Value::str(v)))
            .collect()
    }

    /// `$_SERVER`
    pub fn server(&self) -> Array {
        let mut server = Self::pairs(&self.env);
        let argv = Array::from_values(self.argv.iter().map(|a| Value::str(a)));
        let set = |server: &mut Array, key: &str, value: Value| {
            server.insert(ArrayKey::from(key), value);
        };
        set(&mut server, "argc", Value::Int(argv.len() as i64));
        set(&mut server, "argv", Value::Array(argv));
        set(&mut server, "DOCUMENT_ROOT", Value::str(&self.document_root));
        set(&mut server, "PHP_SELF", Value::str(&self.script_filename));
        set(&mut server, "SCRIPT_FILENAME", Value::str(&self.script_filename));
        set(&mut server, "SCRIPT_NAME", Value::str(&self.script_filename));
        set(&mut server, "REQUEST_TIME", Value::Int(self.time.timestamp()));
        set(
            &mut server,
            "REQUEST_TIME_FLOAT",
            Value::Float(self.time.timestamp_micros() as f64 / 1_000_000.0),
        );
        server
    }

    /// Every superglobal, honoring `variables_order` (E, G, P, C, S) and `request_order`
    pub fn superglobals(&self, config: &Config) -> Vec<(&'static str, Array)> {
        let enabled = |c: char| config.variables_order.to_ascii_uppercase().contains(c);
        let pick = |c: char, pairs: &[(String, String)]| {
            if enabled(c) { Self::pairs(pairs) } else { Array::new() }
        };

        let mut request = Array::new();
        for c in config.request_order.to_ascii_uppercase().chars() {
            let source = match c {
                'G' => &self.get,
                'P' => &self.post,
                'C' => &self.cookie,
                _ => continue,
            };
            for (k, v) in source {
                request.insert(ArrayKey::from_bytes(k.as_bytes()), Value::str(v));
            }
        }

        vec![
            ("_SERVER", if enabled('S') { self.server() } else { Array::new() }),
            ("_ENV", pick('E', &self.env)),
            ("_GET", pick('G', &self.get)),
            ("_POST", pick('P', &self.post)),
            ("_COOKIE", pick('C', &self.cookie)),
            ("_FILES", Array::new()),
            ("_REQUEST", request),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request {
        let mut req = Request::empty("/srv/index.php");
        req.argv.push("--verbose".to_string());
        req.get = vec![("a".to_string(), "1".to_string()), ("b".to_string(), "g".to_string())];
        req.post = vec![("b".to_string(), "p".to_string())];
        req.env = vec![("HOME".to_string(), "/root".to_string())];
        req
    }

    #[test]
    fn test_server_entries() {
        let server = request().server();
        assert_eq!(server.get(&ArrayKey::from("argc")).as_deref(), Some(&Value::Int(2)));
        assert_eq!(server.get(&ArrayKey::from("HOME")).as_deref(), Some(&Value::str("/root")));
        assert_eq!(server.get(&ArrayKey::from("REQUEST_TIME")).as_deref(), Some(&Value::Int(0)));
        assert_eq!(
            server.get(&ArrayKey::from("SCRIPT_FILENAME")).as_deref(),
            Some(&Value::str("/srv/index.php"))
        );
    }

    #[test]
    fn test_request_order_later_sources_win() {
        let config = Config::default();
        let globals = request().superglobals(&config);
        let (_, req) = globals.iter().find(|(n, _)| *n == "_REQUEST").unwrap();
        assert_eq!(req.get(&ArrayKey::from("a")).as_deref(), Some(&Value::str("1")));
        assert_eq!(req.get(&ArrayKey::from("b")).as_deref(), Some(&Value::str("p")));
    }

    #[test]
    fn test_variables_order_disables_sources() {
        let mut config = Config::default();
        config.variables_order = "GPCS".to_string();
        let globals = request().superglobals(&config);
        let (_, env) = globals.iter().find(|(n, _)| *n == "_ENV").unwrap();
        assert!(env.is_empty());
    }
}
