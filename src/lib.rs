use async_trait::async_trait;
use config::Config;
use error::RecallError;
use kovi::{log, MsgEvent, NoticeEvent, PluginBuilder as P, RuntimeBot};
use recall::{MemberName, RecallEvent, PLATFORM};
use req::ChatClient;
use std::sync::Arc;

pub mod clean;
pub mod config;
pub mod error;
pub mod recall;
pub mod req;
pub mod responder;
pub mod stream;

pub use responder::{Dice, Outcome, RecallHost, Responder};
pub use stream::{ChatStream, StreamRegistry};

struct KoviHost {
    bot: Arc<RuntimeBot>,
    chat_client: Option<ChatClient>,
    streams: Arc<StreamRegistry>,
}

#[async_trait]
impl RecallHost for KoviHost {
    fn stream(&self, group_id: i64, platform: &str) -> Option<ChatStream> {
        self.streams.get(group_id, platform)
    }

    async fn member_name(&self, group_id: i64, user_id: i64) -> Result<String, RecallError> {
        let info = self
            .bot
            .get_group_member_info(group_id, user_id, false)
            .await
            .map_err(|err| RecallError::Api(err.to_string()))?;

        Ok(MemberName::from_member_info(&info.data).display_name(user_id))
    }

    async fn generate(&self, stream: &ChatStream, prompt: &str) -> Result<String, RecallError> {
        let client = self
            .chat_client
            .as_ref()
            .ok_or_else(|| RecallError::Llm("llm is not configured".to_string()))?;

        client.request_completion(&stream.recent, prompt).await
    }

    async fn send_text(&self, stream: &ChatStream, text: &str) -> Result<(), RecallError> {
        self.bot
            .send_group_msg_return(stream.group_id, text)
            .await
            .map(|_| ())
            .map_err(|err| RecallError::Send(err.to_string()))
    }
}

#[kovi::plugin]
async fn main() {
    let bot = P::get_runtime_bot();
    let data_path = bot.get_data_path();

    let default_config = Config::default();

    let config =
        match kovi::utils::load_json_data(default_config.clone(), data_path.join("config.json")) {
            Ok(config) => config,
            Err(err) => {
                log::error!("recall_quip: Failed to load config: {}", err);
                if let Ok(admin) = bot.get_main_admin() {
                    bot.send_private_msg(admin, "recall_quip: Failed to load config");
                }
                default_config
            }
        }
        .normalized();

    if !config.plugin.enabled {
        log::info!("[recall_quip] 插件已禁用，不注册任何处理器");
        return;
    }

    for (section, key, desc) in Config::schema() {
        log::debug!("[recall_quip] {}.{}: {}", section, key, desc);
    }

    let chat_client = ChatClient::new(&config.llm);
    if chat_client.is_none() {
        log::warn!("[recall_quip] llm 未配置，只能使用 fixed_responses 定型文");
    }

    let streams = Arc::new(StreamRegistry::new(config.recall_response.context_size));

    let host = KoviHost {
        bot: bot.clone(),
        chat_client,
        streams: streams.clone(),
    };
    let responder = Arc::new(Responder::new(host, config.recall_response.clone()));

    P::on_group_msg(move |e| on_group_msg(e, streams.clone()));

    P::on_all_notice(move |e| on_notice(e, responder.clone()));
}

async fn on_group_msg(e: Arc<MsgEvent>, streams: Arc<StreamRegistry>) {
    let group_id = match e.group_id {
        Some(id) => id,
        None => return,
    };

    let text = e.message.to_human_string();
    let line = format!("{}: {}", e.get_sender_nickname(), text.trim());

    streams.observe(PLATFORM, group_id, line);
}

async fn on_notice<H: RecallHost>(e: Arc<NoticeEvent>, responder: Arc<Responder<H>>) {
    let event = match RecallEvent::from_notice(&e.original_json) {
        Some(v) => v,
        None => return,
    };

    if event.is_self_recall(e.self_id) {
        return;
    }

    log::info!(
        "[recall_quip] 检测到撤回：{} 在群 {} 撤回了 {} 的消息",
        event.operator_id,
        event.group_id,
        event.author_id
    );

    responder.handle(&event).await;
}
