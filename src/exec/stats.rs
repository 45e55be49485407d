//! Per-query modification counters.

use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultStatistics {
    pub labels_added: u64,
    pub nodes_created: u64,
    pub properties_set: u64,
    pub relationships_created: u64,
    pub nodes_deleted: u64,
    pub relationships_deleted: u64,
    pub execution_time: Duration,
}

impl ResultStatistics {
    /// True if the query changed the graph.
    pub fn indicates_modification(&self) -> bool {
        self.labels_added > 0
            || self.nodes_created > 0
            || self.properties_set > 0
            || self.relationships_created > 0
            || self.nodes_deleted > 0
            || self.relationships_deleted > 0
    }

    /// Non-zero counters followed by the execution time.
    pub fn lines(&self) -> Vec<String> {
        let counters = [
            ("Labels added", self.labels_added),
            ("Nodes created", self.nodes_created),
            ("Properties set", self.properties_set),
            ("Relationships created", self.relationships_created),
            ("Nodes deleted", self.nodes_deleted),
            ("Relationships deleted", self.relationships_deleted),
        ];
        let mut lines: Vec<String> = counters
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|(name, count)| format!("{name}: {count}"))
            .collect();
        lines.push(format!(
            "Query internal execution time: {:.6} milliseconds",
            self.execution_time.as_secs_f64() * 1000.0
        ));
        lines
    }
}
