//! One user turn: ask the model, relay its tool calls to MCP servers, feed the
//! results back, and repeat until a round produces no tool results.

use futures::future::join_all;
use relay_llm::{InputItem, LlmProvider, OutputItem};
use relay_mcp::{McpManager, ToolSession};
use serde_json::{Map, Value};

use crate::error::DispatchError;

/// A decoded `function_call` item bound for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Assistant text of the final round; earlier rounds' text is dropped.
    pub reply: String,
    /// Id of the last model response; pass it to the next turn.
    pub previous_response_id: Option<String>,
}

pub struct Dispatcher<'a, P, S> {
    provider: &'a P,
    manager: &'a McpManager<S>,
    round_limit: Option<usize>,
}

impl<'a, P: LlmProvider, S: ToolSession> Dispatcher<'a, P, S> {
    #[must_use]
    pub fn new(provider: &'a P, manager: &'a McpManager<S>) -> Self {
        Self {
            provider,
            manager,
            round_limit: None,
        }
    }

    /// Cap the number of tool-result rounds per turn. `None` removes the cap.
    #[must_use]
    pub fn with_round_limit(mut self, limit: Option<usize>) -> Self {
        self.round_limit = limit;
        self
    }

    /// Run one turn starting from `user_text`.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Llm` if a model request fails,
    /// `DispatchError::ArgumentDecode` if a call's arguments are not a JSON
    /// object, and `DispatchError::RoundLimit` if the cap is exceeded. Tool
    /// failures are not errors; they are relayed to the model as text.
    pub async fn run_turn(
        &self,
        user_text: &str,
        previous_response_id: Option<String>,
    ) -> Result<TurnOutcome, DispatchError> {
        let tools = self.manager.tool_definitions();
        let mut input = vec![InputItem::user(user_text)];
        let mut previous_response_id = previous_response_id;
        let mut tool_rounds = 0usize;

        let reply = loop {
            let response = self
                .provider
                .respond(&input, tools, previous_response_id.as_deref())
                .await?;
            previous_response_id = Some(response.id.clone());

            let mut pending = Vec::new();
            let mut texts = Vec::new();
            for item in &response.output {
                match item {
                    OutputItem::Message { .. } => {
                        if let Some(text) = item.message_text().filter(|t| !t.is_empty()) {
                            texts.push(text);
                        }
                    }
                    OutputItem::FunctionCall {
                        name,
                        arguments,
                        call_id,
                    } => {
                        let invocation = decode_call(name, arguments, call_id)?;
                        match self.manager.resolve(name) {
                            Some(session) => pending.push((session, invocation)),
                            None => {
                                tracing::debug!(tool_name = %name, call_id = %call_id, "model called unknown tool, skipping");
                            }
                        }
                    }
                    OutputItem::Other => {}
                }
            }

            if pending.is_empty() {
                break texts.join("\n");
            }
            if let Some(limit) = self.round_limit
                && tool_rounds >= limit
            {
                tracing::warn!(limit, "tool round limit reached");
                return Err(DispatchError::RoundLimit { limit });
            }
            tool_rounds += 1;

            tracing::debug!(round = tool_rounds, calls = pending.len(), "relaying tool calls");
            input = join_all(
                pending
                    .into_iter()
                    .map(|(session, invocation)| invoke(session, invocation)),
            )
            .await;
        };

        Ok(TurnOutcome {
            reply,
            previous_response_id,
        })
    }
}

fn decode_call(name: &str, arguments: &str, call_id: &str) -> Result<ToolInvocation, DispatchError> {
    let arguments = serde_json::from_str::<Map<String, Value>>(arguments).map_err(|source| {
        DispatchError::ArgumentDecode {
            call_id: call_id.to_owned(),
            tool_name: name.to_owned(),
            source,
        }
    })?;
    Ok(ToolInvocation {
        call_id: call_id.to_owned(),
        tool_name: name.to_owned(),
        arguments,
    })
}

async fn invoke<S: ToolSession>(session: &S, invocation: ToolInvocation) -> InputItem {
    let ToolInvocation {
        call_id,
        tool_name,
        arguments,
    } = invocation;
    tracing::info!(
        server_id = session.id(),
        tool_name = %tool_name,
        call_id = %call_id,
        arguments = %serde_json::Value::Object(arguments.clone()),
        "calling tool"
    );

    let output = match session.call_tool(&tool_name, arguments).await {
        Ok(output) => {
            if output.is_error {
                tracing::warn!(server_id = session.id(), tool_name = %tool_name, "tool reported an error: {}", output.text);
            } else {
                tracing::debug!(server_id = session.id(), tool_name = %tool_name, bytes = output.text.len(), "tool returned");
            }
            output.text
        }
        Err(e) => {
            tracing::warn!(server_id = session.id(), tool_name = %tool_name, "tool call failed: {e}");
            format!("error: {e}")
        }
    };
    InputItem::function_output(call_id, output)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use relay_llm::ModelResponse;
    use relay_llm::mock::{MockProvider, function_call, text_response};
    use relay_mcp::mock::{MockConnector, MockSession};
    use relay_mcp::{McpTransport, ServerDescriptor, ToolOutput};

    use super::*;

    fn stdio(id: &str) -> ServerDescriptor {
        ServerDescriptor {
            id: id.into(),
            transport: McpTransport::Stdio {
                command: "server".into(),
                args: vec![],
                env: BTreeMap::new(),
            },
        }
    }

    async fn manager_with(sessions: Vec<MockSession>) -> (McpManager<MockSession>, MockConnector) {
        let ids: Vec<String> = sessions.iter().map(|s| s.id().to_owned()).collect();
        let connector = sessions
            .into_iter()
            .fold(MockConnector::default(), MockConnector::with_server);
        let descriptors: Vec<_> = ids.iter().map(|id| stdio(id)).collect();
        (McpManager::load(&connector, &descriptors).await, connector)
    }

    fn calls(id: &str, items: Vec<OutputItem>) -> ModelResponse {
        ModelResponse {
            id: id.into(),
            output: items,
        }
    }

    #[tokio::test]
    async fn no_function_calls_returns_after_one_round() {
        let (manager, connector) =
            manager_with(vec![MockSession::new("platform").with_tool("get_platform")]).await;
        let provider = MockProvider::with_responses(vec![text_response("resp_1", "Hello!")]);

        let outcome = Dispatcher::new(&provider, &manager)
            .run_turn("hi", None)
            .await
            .unwrap();

        assert_eq!(outcome.reply, "Hello!");
        assert_eq!(outcome.previous_response_id.as_deref(), Some("resp_1"));
        assert!(connector.calls().is_empty());
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].input, [InputItem::user("hi")]);
        assert_eq!(requests[0].tool_names, ["get_platform"]);
        assert!(requests[0].previous_response_id.is_none());
    }

    #[tokio::test]
    async fn call_id_round_trips_into_next_request() {
        let (manager, connector) = manager_with(vec![
            MockSession::new("platform")
                .with_tool("get_platform")
                .with_output("get_platform", ToolOutput::text("*nix")),
        ])
        .await;
        let provider = MockProvider::with_responses(vec![
            calls("resp_1", vec![function_call("get_platform", "{}", "call_abc")]),
            text_response("resp_2", "You are on *nix."),
        ]);

        let outcome = Dispatcher::new(&provider, &manager)
            .run_turn("which OS?", Some("resp_0".into()))
            .await
            .unwrap();

        assert_eq!(outcome.reply, "You are on *nix.");
        assert_eq!(outcome.previous_response_id.as_deref(), Some("resp_2"));
        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].previous_response_id.as_deref(), Some("resp_0"));
        assert_eq!(
            requests[1].input,
            [InputItem::function_output("call_abc", "*nix")]
        );
        assert_eq!(requests[1].previous_response_id.as_deref(), Some("resp_1"));
        assert_eq!(connector.calls().len(), 1);
        assert_eq!(connector.calls()[0].tool_name, "get_platform");
    }

    #[tokio::test]
    async fn unknown_tool_is_skipped() {
        let (manager, connector) =
            manager_with(vec![MockSession::new("platform").with_tool("get_platform")]).await;
        let provider = MockProvider::with_responses(vec![calls(
            "resp_1",
            vec![function_call("delete_everything", "{}", "call_x")],
        )]);

        let outcome = Dispatcher::new(&provider, &manager)
            .run_turn("go", None)
            .await
            .unwrap();

        assert!(outcome.reply.is_empty());
        assert_eq!(provider.requests().len(), 1);
        assert!(connector.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn results_keep_item_order_when_calls_finish_out_of_order() {
        let (manager, connector) = manager_with(vec![
            MockSession::new("web")
                .with_tool("slow_search")
                .with_delay("slow_search", Duration::from_millis(200)),
            MockSession::new("clock").with_tool("now"),
        ])
        .await;
        let provider = MockProvider::with_responses(vec![
            calls(
                "resp_1",
                vec![
                    function_call("slow_search", r#"{"keyword":"rust"}"#, "call_1"),
                    function_call("now", "{}", "call_2"),
                ],
            ),
            text_response("resp_2", "done"),
        ]);

        Dispatcher::new(&provider, &manager)
            .run_turn("search and time", None)
            .await
            .unwrap();

        let finished: Vec<_> = connector.calls().into_iter().map(|c| c.tool_name).collect();
        assert_eq!(finished, ["now", "slow_search"]);
        assert_eq!(
            provider.requests()[1].input,
            [
                InputItem::function_output("call_1", "slow_search ok"),
                InputItem::function_output("call_2", "now ok"),
            ]
        );
    }

    #[tokio::test]
    async fn arguments_are_passed_as_object() {
        let (manager, connector) =
            manager_with(vec![MockSession::new("web").with_tool("search")]).await;
        let provider = MockProvider::with_responses(vec![calls(
            "resp_1",
            vec![function_call("search", r#"{"keyword":"rust","limit":3}"#, "c1")],
        )]);

        Dispatcher::new(&provider, &manager)
            .run_turn("search", None)
            .await
            .unwrap();

        let recorded = &connector.calls()[0];
        assert_eq!(recorded.arguments["keyword"], "rust");
        assert_eq!(recorded.arguments["limit"], 3);
    }

    #[tokio::test]
    async fn malformed_arguments_abort_the_turn() {
        let (manager, connector) =
            manager_with(vec![MockSession::new("web").with_tool("search")]).await;
        let provider = MockProvider::with_responses(vec![calls(
            "resp_1",
            vec![function_call("search", "{'keyword': 'rust'}", "call_9")],
        )]);

        let err = Dispatcher::new(&provider, &manager)
            .run_turn("search", None)
            .await
            .unwrap_err();

        match err {
            DispatchError::ArgumentDecode {
                call_id, tool_name, ..
            } => {
                assert_eq!(call_id, "call_9");
                assert_eq!(tool_name, "search");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(connector.calls().is_empty());
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected() {
        let (manager, _connector) =
            manager_with(vec![MockSession::new("web").with_tool("search")]).await;
        let provider = MockProvider::with_responses(vec![calls(
            "resp_1",
            vec![function_call("search", "[\"rust\"]", "call_1")],
        )]);

        let err = Dispatcher::new(&provider, &manager)
            .run_turn("search", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ArgumentDecode { .. }));
    }

    #[tokio::test]
    async fn tool_failures_are_relayed_as_text() {
        let (manager, _connector) = manager_with(vec![
            MockSession::new("shell")
                .with_tool("run")
                .with_tool("broken")
                .with_output("run", ToolOutput::error("permission denied"))
                .with_call_failure("broken", "pipe closed"),
        ])
        .await;
        let provider = MockProvider::with_responses(vec![
            calls(
                "resp_1",
                vec![
                    function_call("run", r#"{"cmd":"ls /root"}"#, "c1"),
                    function_call("broken", "{}", "c2"),
                ],
            ),
            text_response("resp_2", "Both failed."),
        ]);

        let outcome = Dispatcher::new(&provider, &manager)
            .run_turn("try", None)
            .await
            .unwrap();

        assert_eq!(outcome.reply, "Both failed.");
        assert_eq!(
            provider.requests()[1].input,
            [
                InputItem::function_output("c1", "permission denied"),
                InputItem::function_output(
                    "c2",
                    "error: tool call failed: shell/broken: pipe closed"
                ),
            ]
        );
    }

    #[tokio::test]
    async fn reply_is_final_round_text() {
        let (manager, _connector) =
            manager_with(vec![MockSession::new("platform").with_tool("get_platform")]).await;
        let mut first = text_response("resp_1", "Let me check.");
        first
            .output
            .push(function_call("get_platform", "{}", "call_1"));
        let provider =
            MockProvider::with_responses(vec![first, text_response("resp_2", "You are on *nix.")]);

        let outcome = Dispatcher::new(&provider, &manager)
            .run_turn("which OS?", None)
            .await
            .unwrap();

        assert_eq!(outcome.reply, "You are on *nix.");
    }

    #[tokio::test]
    async fn round_limit_stops_runaway_turns() {
        let (manager, connector) =
            manager_with(vec![MockSession::new("clock").with_tool("now")]).await;
        let provider = MockProvider::with_responses(vec![
            calls("r1", vec![function_call("now", "{}", "c1")]),
            calls("r2", vec![function_call("now", "{}", "c2")]),
            calls("r3", vec![function_call("now", "{}", "c3")]),
        ]);

        let err = Dispatcher::new(&provider, &manager)
            .with_round_limit(Some(2))
            .run_turn("loop", None)
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::RoundLimit { limit: 2 }));
        assert_eq!(provider.requests().len(), 3);
        assert_eq!(connector.calls().len(), 2);
    }

    #[tokio::test]
    async fn llm_failure_propagates() {
        let (manager, _connector) = manager_with(vec![]).await;
        let provider = MockProvider::failing();

        let err = Dispatcher::new(&provider, &manager)
            .run_turn("hi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Llm(_)));
    }
}
