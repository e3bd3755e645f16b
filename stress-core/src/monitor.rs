//! Remote log monitoring.
//!
//! Enumerates healthy compute nodes from the controller's service listing
//! and greps their logs for error markers. Every remote failure is treated
//! as "no evidence": the monitor never fails a run by being unreachable.

use crate::config::StressSection;
use crate::remote::RemoteExec;
use serde::Serialize;
use std::sync::Arc;

/// First error found in a node's logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogHit {
    /// Node whose logs matched.
    pub node: String,
    /// Matching lines as returned by the search.
    pub excerpt: String,
}

/// How to read the controller's service listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeListing {
    /// Command run on the controller.
    pub command: String,
    /// Whitespace-separated field holding the host name.
    pub host_field: usize,
    /// Whitespace-separated field holding the state.
    pub status_field: usize,
    /// State value of an active node.
    pub happy_marker: String,
}

impl NodeListing {
    /// Parse listing output into active host names.
    ///
    /// A line such as `nova-compute node1 nova enabled :-) 2011-10-31 18:57:46`
    /// yields `node1`. Short, blank or inactive lines are skipped.
    pub fn parse(&self, output: &str) -> Vec<String> {
        output
            .lines()
            .filter_map(|line| {
                let words: Vec<&str> = line.split_whitespace().collect();
                let status = words.get(self.status_field)?;
                if *status != self.happy_marker {
                    return None;
                }
                words.get(self.host_field).map(|host| host.to_string())
            })
            .collect()
    }
}

/// Watches target node logs through a [`RemoteExec`] channel.
#[derive(Clone)]
pub struct RemoteLogMonitor {
    channel: Arc<dyn RemoteExec>,
    listing: NodeListing,
    error_markers: Vec<String>,
}

impl std::fmt::Debug for RemoteLogMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLogMonitor")
            .field("listing", &self.listing)
            .field("error_markers", &self.error_markers)
            .finish_non_exhaustive()
    }
}

impl RemoteLogMonitor {
    /// Create a monitor using listing and marker settings from `config`.
    pub fn new(channel: Arc<dyn RemoteExec>, config: &StressSection) -> Self {
        Self {
            channel,
            listing: NodeListing {
                command: config.node_list_command.clone(),
                host_field: config.node_host_field,
                status_field: config.node_status_field,
                happy_marker: config.node_happy_marker.clone(),
            },
            error_markers: config.error_markers.clone(),
        }
    }

    /// Active compute nodes as reported by `controller`.
    ///
    /// Returns an empty list when the controller cannot be reached.
    pub async fn list_active_nodes(&self, controller: &str) -> Vec<String> {
        match self.channel.run(&self.listing.command, controller).await {
            Ok(output) => {
                let nodes = self.listing.parse(&output);
                tracing::debug!(controller, nodes = ?nodes, "active compute nodes");
                nodes
            }
            Err(e) => {
                tracing::warn!(controller, error = %e, "could not list compute nodes");
                Vec::new()
            }
        }
    }

    /// Remove `logfiles` on every node. Failures are logged and ignored.
    pub async fn clear_logs(&self, nodes: &[String], logfiles: &str) {
        let command = format!("rm -f {}", logfiles);
        for node in nodes {
            if let Err(e) = self.channel.run(&command, node).await {
                tracing::debug!(node = %node, error = %e, "log cleanup failed");
            }
        }
    }

    /// Search each node's logs in order and return the first hit.
    pub async fn scan(&self, nodes: &[String], logfiles: &str) -> Option<LogHit> {
        let command = self.search_command(logfiles);
        for node in nodes {
            let output = match self.channel.run(&command, node).await {
                Ok(output) => output,
                // grep exits non-zero on no match; unreachable hosts land here too
                Err(e) => {
                    tracing::debug!(node = %node, error = %e, "no log evidence");
                    continue;
                }
            };

            let excerpt = output.trim();
            if !excerpt.is_empty() {
                tracing::error!(node = %node, "{}", excerpt);
                return Some(LogHit {
                    node: node.clone(),
                    excerpt: excerpt.to_string(),
                });
            }
        }
        None
    }

    fn search_command(&self, logfiles: &str) -> String {
        format!("egrep \"{}\" {}", self.error_markers.join("|"), logfiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::ScriptedRemote;

    fn monitor(remote: Arc<ScriptedRemote>) -> RemoteLogMonitor {
        RemoteLogMonitor::new(remote, &StressSection::default())
    }

    #[test]
    fn listing_keeps_only_happy_nodes() {
        let listing = NodeListing {
            command: String::new(),
            host_field: 1,
            status_field: 4,
            happy_marker: ":-)".into(),
        };
        let output = "\
nova-compute node1 nova enabled :-) 2011-10-31 18:57:46
nova-compute node2 nova enabled XXX 2011-10-31 18:57:46

garbage
nova-compute node3 nova disabled :-) 2011-10-31 18:57:46
";
        assert_eq!(listing.parse(output), vec!["node1", "node3"]);
    }

    #[test]
    fn listing_tolerates_empty_output() {
        let listing = NodeListing {
            command: String::new(),
            host_field: 1,
            status_field: 4,
            happy_marker: ":-)".into(),
        };
        assert!(listing.parse("").is_empty());
        assert!(listing.parse("a b c").is_empty());
    }

    #[tokio::test]
    async fn unreachable_controller_yields_no_nodes() {
        let remote = Arc::new(ScriptedRemote::default());
        assert!(monitor(remote).list_active_nodes("ctl").await.is_empty());
    }

    #[tokio::test]
    async fn list_active_nodes_runs_listing_on_controller() {
        let remote = Arc::new(ScriptedRemote::default());
        remote.reply(
            "ctl",
            "nova-manage",
            "nova-compute c1 nova enabled :-) now\n",
        );
        let nodes = monitor(remote.clone()).list_active_nodes("ctl").await;
        assert_eq!(nodes, vec!["c1"]);
        assert_eq!(
            remote.calls_to("ctl"),
            vec!["nova-manage service list | grep ^nova-compute"]
        );
    }

    #[tokio::test]
    async fn clear_logs_hits_every_node() {
        let remote = Arc::new(ScriptedRemote::default());
        let nodes = vec!["c1".to_string(), "c2".to_string()];
        monitor(remote.clone())
            .clear_logs(&nodes, "/var/log/nova/*.log")
            .await;
        assert_eq!(remote.calls_to("c1"), vec!["rm -f /var/log/nova/*.log"]);
        assert_eq!(remote.calls_to("c2"), vec!["rm -f /var/log/nova/*.log"]);
    }

    #[tokio::test]
    async fn scan_returns_first_hit_and_stops() {
        let remote = Arc::new(ScriptedRemote::default());
        remote.reply("c1", "egrep", "");
        remote.reply("c2", "egrep", "2013 ERROR nova.compute boom\n");
        remote.reply("c3", "egrep", "TRACE later\n");
        let nodes: Vec<String> = ["c0", "c1", "c2", "c3"].iter().map(|s| s.to_string()).collect();

        let hit = monitor(remote.clone())
            .scan(&nodes, "/var/log/nova/*.log")
            .await
            .unwrap();

        assert_eq!(hit.node, "c2");
        assert_eq!(hit.excerpt, "2013 ERROR nova.compute boom");
        assert!(remote.calls_to("c3").is_empty());
        assert_eq!(
            remote.calls_to("c2"),
            vec!["egrep \"ERROR|TRACE\" /var/log/nova/*.log"]
        );
    }

    #[tokio::test]
    async fn scan_without_evidence_is_none() {
        let remote = Arc::new(ScriptedRemote::default());
        remote.reply("c1", "egrep", "   \n");
        let nodes = vec!["c1".to_string(), "unreachable".to_string()];
        assert!(monitor(remote).scan(&nodes, "/x.log").await.is_none());
    }
}
