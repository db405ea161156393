//! Deterministic mapping from logical name to Redis key.
//!
//! All keys share the literal `"{Q}:"` hash-tag prefix followed by the queue
//! name, so Redis Cluster routes every key belonging to one queue to the same
//! slot. The brace-wrapped `Q` is fixed text, not a template for the queue
//! name — reproducing it verbatim is part of the wire contract external
//! tooling depends on.

#[derive(Debug, Clone)]
pub struct KeyLayout {
    prefix: String,
}

impl KeyLayout {
    pub fn new(queue_name: &str) -> Self {
        Self {
            prefix: format!("{{Q}}:{queue_name}:"),
        }
    }

    pub fn listen(&self) -> String {
        format!("{}listen", self.prefix)
    }

    pub fn jobs(&self, group: &str) -> String {
        format!("{}jobs:{group}", self.prefix)
    }

    pub fn delay_time(&self) -> String {
        format!("{}delay:time", self.prefix)
    }

    pub fn delay_lock(&self) -> String {
        format!("{}delay:lock", self.prefix)
    }

    pub fn delay_jobs(&self, fire_at: i64) -> String {
        format!("{}delay:jobs:{fire_at}", self.prefix)
    }

    pub fn unique(&self, uid: &str) -> String {
        format!("{}unique:{uid}", self.prefix)
    }

    pub fn watch(&self, host: &str) -> String {
        format!("{}watch:{host}", self.prefix)
    }

    pub fn worker(&self, id: &str) -> String {
        format!("{}worker:{id}", self.prefix)
    }

    pub fn success(&self) -> String {
        format!("{}success", self.prefix)
    }

    pub fn failed(&self) -> String {
        format!("{}failed", self.prefix)
    }

    /// Pattern for enumerating every host's watch hash, used only by the
    /// Admin surface (KeyLayout §4.1: "cross-host queries iterate hosts via
    /// Redis `KEYS watch:*` only through the Admin surface").
    pub fn watch_pattern(&self) -> String {
        format!("{}watch:*", self.prefix)
    }
}
