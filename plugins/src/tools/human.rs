use planloop_core::tool::{Handler, ParamType, Tool, ToolParameter, ToolReturn, HUMAN_FEEDBACK_COMMAND};

/// Catalog entry for the reserved feedback command. The registry turns the
/// call into a human interrupt before this handler would run.
pub fn human_feedback_tool() -> Tool {
    Tool::builder(
        HUMAN_FEEDBACK_COMMAND,
        "Ask the user a question when you are stuck or need a decision",
    )
    .alias("ask_user")
    .parameter(ToolParameter::required(
        "question",
        ParamType::String,
        "The question to ask the user",
    ))
    .handler(Handler::sync(|args, _| {
        Ok(ToolReturn::new(args.get("question").cloned().unwrap_or_default()))
    }))
}
