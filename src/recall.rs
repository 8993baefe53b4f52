use kovi::serde_json::Value;

pub(crate) static PLATFORM: &str = "qq";

static UNKNOWN_NAME: &str = "某人";

/// A group recall notice as reported by the OneBot server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecallEvent {
    pub group_id: i64,
    /// Who pressed recall.
    pub operator_id: i64,
    /// Author of the recalled message.
    pub author_id: i64,
    pub platform: String,
}

impl RecallEvent {
    /// Parses a `group_recall` notice. Friend recalls and every other notice give `None`.
    pub fn from_notice(json: &Value) -> Option<RecallEvent> {
        if json.get("notice_type")?.as_str()? != "group_recall" {
            return None;
        }

        let group_id = read_id(json.get("group_id"))?;
        if group_id == 0 {
            return None;
        }

        let author_id = read_id(json.get("user_id")).unwrap_or(0);
        let operator_id = read_id(json.get("operator_id")).unwrap_or(author_id);

        Some(RecallEvent {
            group_id,
            operator_id,
            author_id,
            platform: PLATFORM.to_string(),
        })
    }

    /// A moderator took down someone else's message.
    pub fn is_moderated(&self) -> bool {
        self.author_id != 0 && self.author_id != self.operator_id
    }

    /// The bot recalled its own message; replying would loop.
    pub fn is_self_recall(&self, self_id: i64) -> bool {
        self.operator_id == self_id
    }

    /// The person the quip is about.
    pub fn target_id(&self) -> i64 {
        if self.is_moderated() {
            self.author_id
        } else {
            self.operator_id
        }
    }
}

// napcat reports ids as numbers, some servers as strings
fn read_id(v: Option<&Value>) -> Option<i64> {
    match v? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberName {
    pub card: Option<String>,
    pub nickname: Option<String>,
}

impl MemberName {
    pub fn from_member_info(data: &Value) -> MemberName {
        let field = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);

        MemberName {
            card: field("card"),
            nickname: field("nickname"),
        }
    }

    pub fn display_name(&self, fallback_id: i64) -> String {
        [&self.card, &self.nickname]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fallback_name(fallback_id))
    }
}

pub(crate) fn fallback_name(id: i64) -> String {
    if id == 0 {
        UNKNOWN_NAME.to_string()
    } else {
        id.to_string()
    }
}
