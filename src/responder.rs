//! Decides whether a recall gets a quip, builds it and sends it.

use crate::config::RecallSection;
use crate::error::RecallError;
use crate::recall::RecallEvent;
use crate::stream::ChatStream;
use async_trait::async_trait;
use kovi::log;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub(crate) static DESPERATE: &str = "绝望";
pub(crate) static HAPPY: &str = "开心";

/// Everything the responder needs from the bot host.
#[async_trait]
pub trait RecallHost: Send + Sync {
    fn stream(&self, group_id: i64, platform: &str) -> Option<ChatStream>;

    /// Display name of a group member.
    async fn member_name(&self, group_id: i64, user_id: i64) -> Result<String, RecallError>;

    async fn generate(&self, stream: &ChatStream, prompt: &str) -> Result<String, RecallError>;

    async fn send_text(&self, stream: &ChatStream, text: &str) -> Result<(), RecallError>;
}

/// Source of the random draws.
pub trait Dice: Send + Sync {
    /// Uniform in `[0, 1)`.
    fn roll(&self) -> f64;

    /// Uniform index in `0..len`, `len > 0`.
    fn pick(&self, len: usize) -> usize;
}

pub struct ThreadDice;

impl Dice for ThreadDice {
    fn roll(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }

    fn pick(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Missed,
    CoolingDown,
    NoStream,
    NoDescription,
    SendFailed,
    Sent(String),
}

/// Last successful response per group.
#[derive(Debug, Default)]
pub struct Cooldown {
    last: Mutex<HashMap<i64, Instant>>,
}

/// Slot taken by a response in flight. Dropping it without [`Reservation::commit`] hands the
/// slot back.
#[derive(Debug)]
pub struct Reservation<'a> {
    cooldown: &'a Cooldown,
    group_id: i64,
    at: Instant,
    previous: Option<Instant>,
    committed: bool,
}

impl Reservation<'_> {
    /// Keeps the reserved timestamp as the group's last response.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.cooldown.release(self.group_id, self.at, self.previous);
        }
    }
}

impl Cooldown {
    /// Records `now` for the group unless it is still inside `window`.
    pub fn try_reserve(
        &self,
        group_id: i64,
        now: Instant,
        window: Duration,
    ) -> Result<Reservation<'_>, Duration> {
        let mut last = self.last.lock();
        let previous = last.get(&group_id).copied();

        if let Some(prev) = previous {
            let elapsed = now.saturating_duration_since(prev);
            if elapsed < window {
                return Err(window - elapsed);
            }
        }

        last.insert(group_id, now);
        Ok(Reservation {
            cooldown: self,
            group_id,
            at: now,
            previous,
            committed: false,
        })
    }

    // a newer reservation already replaced ours; leave it alone
    fn release(&self, group_id: i64, at: Instant, previous: Option<Instant>) {
        let mut last = self.last.lock();
        if last.get(&group_id) != Some(&at) {
            return;
        }
        match previous {
            Some(prev) => {
                last.insert(group_id, prev);
            }
            None => {
                last.remove(&group_id);
            }
        }
    }

    pub fn last_response(&self, group_id: i64) -> Option<Instant> {
        self.last.lock().get(&group_id).copied()
    }
}

pub struct Responder<H, D = ThreadDice> {
    host: H,
    dice: D,
    config: RecallSection,
    cooldown: Cooldown,
}

impl<H: RecallHost> Responder<H> {
    pub fn new(host: H, config: RecallSection) -> Self {
        Self::with_dice(host, ThreadDice, config)
    }
}

impl<H: RecallHost, D: Dice> Responder<H, D> {
    pub fn with_dice(host: H, dice: D, config: RecallSection) -> Self {
        Self {
            host,
            dice,
            config,
            cooldown: Cooldown::default(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn cooldown(&self) -> &Cooldown {
        &self.cooldown
    }

    pub async fn handle(&self, event: &RecallEvent) -> Outcome {
        self.handle_at(event, Instant::now()).await
    }

    pub async fn handle_at(&self, event: &RecallEvent, now: Instant) -> Outcome {
        let group_id = event.group_id;

        if self.dice.roll() >= self.config.response_probability {
            log::debug!(
                "[recall_quip] 概率未命中（{:.0}%），群 {} 本次不响应",
                self.config.response_probability * 100.0,
                group_id
            );
            return Outcome::Missed;
        }

        let window = Duration::from_secs(self.config.cooldown_seconds);
        let reservation = match self.cooldown.try_reserve(group_id, now, window) {
            Ok(r) => r,
            Err(remaining) => {
                log::debug!(
                    "[recall_quip] 群 {} 冷却中，剩余 {}s，跳过",
                    group_id,
                    remaining.as_secs()
                );
                return Outcome::CoolingDown;
            }
        };

        let outcome = self.respond(event).await;

        if matches!(outcome, Outcome::Sent(_)) {
            reservation.commit();
        }

        outcome
    }

    async fn respond(&self, event: &RecallEvent) -> Outcome {
        let group_id = event.group_id;

        let suffix = if self.dice.roll() < self.config.desperate_probability {
            DESPERATE
        } else {
            HAPPY
        };

        let stream = match self.host.stream(group_id, &event.platform) {
            Some(s) => s,
            None => {
                log::warn!(
                    "[recall_quip] 找不到群 {} 的聊天流，跳过（该群启动后还没有人发过消息）",
                    group_id
                );
                return Outcome::NoStream;
            }
        };

        let target = event.target_id();
        let name = match self.host.member_name(group_id, target).await {
            Ok(name) => name,
            Err(err) => {
                log::debug!("[recall_quip] 获取群成员 {} 名称失败：{}", target, err);
                crate::recall::fallback_name(target)
            }
        };

        let description = match self.describe(&stream, &name).await {
            Ok(v) => v,
            Err(err) => {
                log::error!("[recall_quip] 生成撤回描述失败：{}", err);
                return Outcome::NoDescription;
            }
        };

        let text = compose(&name, &description, suffix);

        match self.host.send_text(&stream, &text).await {
            Ok(()) => {
                log::info!("[recall_quip] 已响应撤回（群 {}）：{}", group_id, text);
                Outcome::Sent(text)
            }
            Err(err) => {
                log::warn!("[recall_quip] 消息发送失败（群 {}）：{}", group_id, err);
                Outcome::SendFailed
            }
        }
    }

    async fn describe(&self, stream: &ChatStream, name: &str) -> Result<String, RecallError> {
        let fixed = &self.config.fixed_responses;
        if !fixed.is_empty() {
            let picked = fixed[self.dice.pick(fixed.len())].clone();
            log::debug!("[recall_quip] 使用定型文：{}", picked);
            return Ok(picked);
        }

        let prompt = build_prompt(name, &self.config.response_style);
        let raw = self.host.generate(stream, &prompt).await?;

        crate::clean::clean_description(&raw).ok_or(RecallError::EmptyCompletion)
    }
}

pub fn compose(name: &str, description: &str, suffix: &str) -> String {
    format!("{}：{}（{}地撤回）", name, description, suffix)
}

pub fn build_prompt(name: &str, style: &str) -> String {
    format!(
        r#"群里 {name} 刚刚撤回了一条消息。

请以你的视角和人设脑回路，想象或揣测【{name}】撤回这条消息的原因（TA做出了什么动作或处于什么心态）。
生成一句约十个字的【动作描述】。

要求：
- 只输出对撤回人行为/心态的描述，不加任何前缀、序号、标点或括号
- 描述风格参考：{style}
- 约8-15个汉字长度，例如：发现自己暴露了XP / 撤回了刚才的暴言 / 肯定又发错群了"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_uses_fixed_pattern() {
        assert_eq!(
            compose("小王", "发现自己暴露了XP", DESPERATE),
            "小王：发现自己暴露了XP（绝望地撤回）"
        );
        assert_eq!(compose("42", "hide...", HAPPY), "42：hide...（开心地撤回）");
    }

    #[test]
    fn prompt_carries_name_and_style() {
        let prompt = build_prompt("小王", "阴阳怪气一点");
        assert!(prompt.contains("【小王】"));
        assert!(prompt.contains("描述风格参考：阴阳怪气一点"));
    }

    #[test]
    fn cooldown_blocks_inside_window() {
        let cooldown = Cooldown::default();
        let t0 = Instant::now();
        let window = Duration::from_secs(60);

        cooldown.try_reserve(1, t0, window).unwrap().commit();
        let remaining = cooldown
            .try_reserve(1, t0 + Duration::from_secs(20), window)
            .unwrap_err();
        assert_eq!(remaining, Duration::from_secs(40));

        assert!(cooldown.try_reserve(2, t0, window).is_ok());
        assert!(cooldown
            .try_reserve(1, t0 + Duration::from_secs(60), window)
            .is_ok());
    }

    #[test]
    fn dropped_reservation_restores_previous_timestamp() {
        let cooldown = Cooldown::default();
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(100);
        let window = Duration::from_secs(60);

        cooldown.try_reserve(1, t0, window).unwrap().commit();
        let r = cooldown.try_reserve(1, t1, window).unwrap();
        assert_eq!(cooldown.last_response(1), Some(t1));

        drop(r);
        assert_eq!(cooldown.last_response(1), Some(t0));

        let r = cooldown.try_reserve(2, t0, window).unwrap();
        drop(r);
        assert_eq!(cooldown.last_response(2), None);
    }

    #[test]
    fn late_failure_keeps_newer_send() {
        let cooldown = Cooldown::default();
        let t0 = Instant::now();
        let window = Duration::from_secs(60);

        // slow response still generating when the window has passed
        let slow = cooldown.try_reserve(1, t0, window).unwrap();
        let fast_at = t0 + Duration::from_secs(61);
        cooldown.try_reserve(1, fast_at, window).unwrap().commit();

        drop(slow);
        assert_eq!(cooldown.last_response(1), Some(fast_at));
        assert!(cooldown
            .try_reserve(1, t0 + Duration::from_secs(62), window)
            .is_err());
    }
}
