use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Snapshot of a group conversation handed to the responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatStream {
    pub stream_id: String,
    pub group_id: i64,
    pub platform: String,
    pub recent: Vec<String>,
}

#[derive(Debug, Default)]
struct StreamState {
    lines: VecDeque<String>,
}

/// Group conversations the bot has seen since startup.
///
/// A stream is created by the first group message the plugin observes; a group that never spoke
/// has no stream.
pub struct StreamRegistry {
    capacity: usize,
    streams: Mutex<HashMap<(String, i64), StreamState>>,
}

impl StreamRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            streams: Mutex::new(HashMap::new()),
        }
    }

    pub fn observe(&self, platform: &str, group_id: i64, line: String) {
        let mut streams = self.streams.lock();
        let state = streams
            .entry((platform.to_string(), group_id))
            .or_default();

        if self.capacity == 0 {
            return;
        }
        while state.lines.len() >= self.capacity {
            state.lines.pop_front();
        }
        state.lines.push_back(line);
    }

    pub fn get(&self, group_id: i64, platform: &str) -> Option<ChatStream> {
        let streams = self.streams.lock();
        let state = streams.get(&(platform.to_string(), group_id))?;

        Some(ChatStream {
            stream_id: stream_id(platform, group_id),
            group_id,
            platform: platform.to_string(),
            recent: state.lines.iter().cloned().collect(),
        })
    }
}

fn stream_id(platform: &str, group_id: i64) -> String {
    format!("{}:group:{}", platform, group_id)
}
