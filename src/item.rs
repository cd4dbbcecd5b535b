use serde::Serialize;
use std::fmt;

/// Identity of a producer or consumer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for WorkerId {
    fn from(id: usize) -> Self {
        WorkerId(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Producer,
    Consumer,
}

impl Role {
    /// Past-tense verb used in trace lines.
    pub fn verb(self) -> &'static str {
        match self {
            Role::Producer => "Produced",
            Role::Consumer => "Consumed",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => f.write_str("Producer"),
            Role::Consumer => f.write_str("Consumer"),
        }
    }
}

/// Payload moved through the buffer. The tag is for traceability only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Item {
    pub producer: WorkerId,
    pub seq: usize,
}

impl Item {
    pub fn new(producer: impl Into<WorkerId>, seq: usize) -> Self {
        Item {
            producer: producer.into(),
            seq,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}-Item{}", self.producer, self.seq)
    }
}
