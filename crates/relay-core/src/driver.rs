use relay_llm::LlmProvider;
use relay_mcp::ToolSession;
use tokio::sync::watch;

use crate::channel::{Channel, ChannelError};
use crate::dispatch::Dispatcher;

/// Reads user turns from a channel and answers each one through the dispatcher.
///
/// Keeps the last response id so consecutive turns share server-side history.
pub struct Driver<'a, P, S, C> {
    dispatcher: Dispatcher<'a, P, S>,
    channel: C,
    previous_response_id: Option<String>,
}

impl<'a, P: LlmProvider, S: ToolSession, C: Channel> Driver<'a, P, S, C> {
    #[must_use]
    pub fn new(dispatcher: Dispatcher<'a, P, S>, channel: C) -> Self {
        Self {
            dispatcher,
            channel,
            previous_response_id: None,
        }
    }

    #[must_use]
    pub fn previous_response_id(&self) -> Option<&str> {
        self.previous_response_id.as_deref()
    }

    /// Run until the channel ends, an empty line is entered, or shutdown is signalled.
    ///
    /// A failed turn is reported on the channel and does not stop the loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel itself fails.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), ChannelError> {
        loop {
            let incoming = tokio::select! {
                result = self.channel.recv() => result?,
                () = shutdown_signal(&mut shutdown) => {
                    tracing::info!("shutting down");
                    break;
                }
            };

            let Some(message) = incoming else {
                tracing::info!("input closed");
                break;
            };
            let text = message.text.trim();
            if text.is_empty() {
                tracing::info!("empty input, exiting");
                break;
            }

            let previous = self.previous_response_id.clone();
            let result = tokio::select! {
                result = self.dispatcher.run_turn(text, previous) => result,
                () = shutdown_signal(&mut shutdown) => {
                    tracing::info!("shutdown during turn, abandoning it");
                    break;
                }
            };

            match result {
                Ok(outcome) => {
                    self.previous_response_id = outcome.previous_response_id;
                    self.channel.send(&outcome.reply).await?;
                }
                Err(e) => {
                    tracing::warn!("turn failed: {e}");
                    self.channel.send(&format!("Error: {e}")).await?;
                }
            }
        }
        Ok(())
    }
}

async fn shutdown_signal(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use relay_llm::mock::{MockProvider, function_call, text_response};
    use relay_llm::{InputItem, ModelResponse};
    use relay_mcp::mock::{MockConnector, MockSession};
    use relay_mcp::{McpManager, McpTransport, ServerDescriptor};

    use super::*;
    use crate::channel::ChannelMessage;

    #[derive(Default)]
    struct ScriptedChannel {
        lines: VecDeque<String>,
        sent: Arc<Mutex<Vec<String>>>,
        hang_when_empty: bool,
    }

    impl ScriptedChannel {
        fn new(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|l| (*l).to_owned()).collect(),
                ..Self::default()
            }
        }
    }

    impl Channel for ScriptedChannel {
        async fn recv(&mut self) -> Result<Option<ChannelMessage>, ChannelError> {
            match self.lines.pop_front() {
                Some(text) => Ok(Some(ChannelMessage { text })),
                None if self.hang_when_empty => std::future::pending().await,
                None => Ok(None),
            }
        }

        async fn send(&mut self, text: &str) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(text.to_owned());
            Ok(())
        }
    }

    async fn platform_manager() -> McpManager<MockSession> {
        let connector = MockConnector::default().with_server(
            MockSession::new("platform")
                .with_tool("get_platform")
                .with_delay("get_platform", std::time::Duration::from_secs(3600)),
        );
        let descriptor = ServerDescriptor {
            id: "platform".into(),
            transport: McpTransport::Stdio {
                command: "platform-server".into(),
                args: vec![],
                env: BTreeMap::new(),
            },
        };
        McpManager::load(&connector, &[descriptor]).await
    }

    #[tokio::test]
    async fn turns_chain_previous_response_id() {
        let manager = platform_manager().await;
        let provider = MockProvider::with_responses(vec![
            text_response("resp_1", "first"),
            text_response("resp_2", "second"),
        ]);
        let channel = ScriptedChannel::new(&["one", "two"]);
        let sent = Arc::clone(&channel.sent);
        let (_tx, rx) = watch::channel(false);

        let mut driver = Driver::new(Dispatcher::new(&provider, &manager), channel);
        driver.run(rx).await.unwrap();

        assert_eq!(*sent.lock().unwrap(), ["first", "second"]);
        assert_eq!(driver.previous_response_id(), Some("resp_2"));
        let requests = provider.requests();
        assert!(requests[0].previous_response_id.is_none());
        assert_eq!(requests[1].previous_response_id.as_deref(), Some("resp_1"));
        assert_eq!(requests[1].input, [InputItem::user("two")]);
    }

    #[tokio::test]
    async fn empty_line_ends_the_loop() {
        let manager = platform_manager().await;
        let provider = MockProvider::default();
        let channel = ScriptedChannel::new(&["hello", "   ", "never sent"]);
        let sent = Arc::clone(&channel.sent);
        let (_tx, rx) = watch::channel(false);

        Driver::new(Dispatcher::new(&provider, &manager), channel)
            .run(rx)
            .await
            .unwrap();

        assert_eq!(provider.requests().len(), 1);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_turn_is_reported_and_loop_continues() {
        let manager = platform_manager().await;
        let provider = MockProvider::with_responses(vec![
            ModelResponse {
                id: "resp_1".into(),
                output: vec![function_call("get_platform", "not json", "call_1")],
            },
            text_response("resp_2", "recovered"),
        ]);
        let channel = ScriptedChannel::new(&["break it", "try again"]);
        let sent = Arc::clone(&channel.sent);
        let (_tx, rx) = watch::channel(false);

        let mut driver = Driver::new(Dispatcher::new(&provider, &manager), channel);
        driver.run(rx).await.unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].starts_with("Error: invalid arguments for tool 'get_platform'"));
        assert_eq!(sent[1], "recovered");
        // the failed turn does not advance the chain
        assert!(provider.requests()[1].previous_response_id.is_none());
    }

    #[tokio::test]
    async fn shutdown_while_waiting_for_input() {
        let manager = platform_manager().await;
        let provider = MockProvider::default();
        let mut channel = ScriptedChannel::new(&[]);
        channel.hang_when_empty = true;
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        Driver::new(Dispatcher::new(&provider, &manager), channel)
            .run(rx)
            .await
            .unwrap();

        assert!(provider.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_abandons_turn_in_flight() {
        let manager = platform_manager().await;
        let provider = MockProvider::with_responses(vec![ModelResponse {
            id: "resp_1".into(),
            output: vec![function_call("get_platform", "{}", "call_1")],
        }]);
        let mut channel = ScriptedChannel::new(&["which OS?"]);
        channel.hang_when_empty = true;
        let sent = Arc::clone(&channel.sent);
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            let _ = tx.send(true);
        });

        let mut driver = Driver::new(Dispatcher::new(&provider, &manager), channel);
        driver.run(rx).await.unwrap();

        assert!(sent.lock().unwrap().is_empty());
        assert!(driver.previous_response_id().is_none());
    }
}
