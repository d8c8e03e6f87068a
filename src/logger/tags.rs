/// Log tags identifying the originating module
///
/// Each tag maps to a `--debug-<key>` command-line switch.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    System,
    Config,
    Cache,
    Upstream,
    Proxy,
    Webserver,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Cache => "CACHE",
            LogTag::Upstream => "UPSTREAM",
            LogTag::Proxy => "PROXY",
            LogTag::Webserver => "WEBSERVER",
        }
    }

    /// Key used for the --debug-<key> flag
    pub fn debug_key(&self) -> &'static str {
        match self {
            LogTag::System => "system",
            LogTag::Config => "config",
            LogTag::Cache => "cache",
            LogTag::Upstream => "upstream",
            LogTag::Proxy => "proxy",
            LogTag::Webserver => "webserver",
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
