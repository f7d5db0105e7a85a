use serde_json::{json, Map, Value};

use crate::error::{AppError, AppResult};
use crate::schemas::{AssistantMessageInput, CreateBookingInput, LineItem, PaymentMethod};
use crate::services::{booking, catalog, invoice, pricing, whatsapp};
use crate::state::AppState;

/// Tools whose effect is a client-rendered widget. The loop stops after one
/// of these so the frontend can show the widget and resume the dialogue.
const UI_TOOLS: &[&str] = &[
    "show_service_menu",
    "show_date_time_picker",
    "request_location",
    "request_place_photos",
    "request_payment_proof",
];

pub async fn run_assistant_chat(
    state: &AppState,
    message: &str,
    conversation: &[AssistantMessageInput],
) -> AppResult<Map<String, Value>> {
    if !state.config.assistant_enabled {
        return Err(AppError::ServiceUnavailable(
            "The booking assistant is disabled in this environment.".to_string(),
        ));
    }

    let catalog = catalog::load_catalog(state).await?;
    let system_prompt = build_system_prompt(state, &catalog);

    let mut messages = vec![json!({"role": "system", "content": system_prompt})];
    let context_start = conversation.len().saturating_sub(12);
    for item in &conversation[context_start..] {
        let role = item.role.trim().to_ascii_lowercase();
        let content = item.content.trim();
        if matches!(role.as_str(), "user" | "assistant") && !content.is_empty() {
            messages.push(json!({
                "role": role,
                "content": truncate_chars(content, 4000),
            }));
        }
    }
    messages.push(json!({
        "role": "user",
        "content": truncate_chars(message.trim(), 4000),
    }));

    let tools = tool_definitions();
    let mut tool_trace: Vec<Value> = Vec::new();
    let mut booking_result: Option<Value> = None;
    let mut ui_action: Option<String> = None;
    let mut model_used = String::new();
    let mut fallback_used = false;

    let max_steps = std::cmp::max(1, state.config.assistant_max_tool_steps);
    for _ in 0..max_steps {
        let (completion, call_model, call_fallback) =
            call_chat_completion(state, &messages, &tools).await?;
        model_used = call_model;
        fallback_used = fallback_used || call_fallback;

        let assistant_message = completion
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let assistant_text = extract_content_text(assistant_message.get("content"));
        let tool_calls = assistant_message
            .get("tool_calls")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        if tool_calls.is_empty() {
            if assistant_text.is_empty() {
                break;
            }
            return Ok(build_reply(
                assistant_text,
                tool_trace,
                booking_result,
                ui_action,
                model_used,
                fallback_used,
            ));
        }

        messages.push(json!({
            "role": "assistant",
            "content": assistant_text,
            "tool_calls": tool_calls.clone(),
        }));

        for call in tool_calls {
            let call_id = call
                .get("id")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or("tool-call")
                .to_string();
            let function = call
                .get("function")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            let tool_name = function
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string();

            let arguments = parse_tool_arguments(function.get("arguments"));
            let tool_result = match arguments {
                Ok(args) => {
                    execute_tool(state, &tool_name, &args, &mut booking_result, &mut ui_action)
                        .await
                        .unwrap_or_else(|error| {
                            json!({ "ok": false, "error": error.detail_message() })
                        })
                }
                Err(error) => json!({ "ok": false, "error": error.detail_message() }),
            };

            tool_trace.push(json!({
                "tool": tool_name,
                "ok": tool_result.get("ok").and_then(Value::as_bool).unwrap_or(false),
            }));

            let payload = serde_json::to_string(&tool_result)
                .unwrap_or_else(|_| "{\"ok\":false}".to_string());
            messages.push(json!({
                "role": "tool",
                "tool_call_id": call_id,
                "content": truncate_chars(&payload, 12000),
            }));
        }

        // A widget request hands control back to the client immediately.
        if ui_action.is_some() {
            let (completion, call_model, call_fallback) =
                call_chat_completion(state, &messages, &[]).await?;
            model_used = call_model;
            fallback_used = fallback_used || call_fallback;
            let text = completion
                .get("choices")
                .and_then(Value::as_array)
                .and_then(|choices| choices.first())
                .and_then(|choice| choice.get("message"))
                .map(|message| extract_content_text(message.get("content")))
                .unwrap_or_default();
            return Ok(build_reply(
                text,
                tool_trace,
                booking_result,
                ui_action,
                model_used,
                fallback_used,
            ));
        }
    }

    Ok(build_reply(
        "I could not complete that within the allowed number of steps. Please try again."
            .to_string(),
        tool_trace,
        booking_result,
        ui_action,
        model_used,
        fallback_used,
    ))
}

fn build_system_prompt(state: &AppState, catalog: &[crate::schemas::ServiceDefinition]) -> String {
    let services = catalog
        .iter()
        .map(|service| {
            format!(
                "- {} (id: {}, {} {} EGP per {})",
                service.name,
                service.id,
                match service.pricing_type {
                    crate::schemas::PricingType::Consultation => "priced after an on-site visit,",
                    _ => "",
                },
                invoice::format_money(service.unit_price),
                service.pricing_type.unit_label(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are the booking assistant for Clean Master, a cleaning-services company. \
Guide the customer step by step: pick services and quantities, choose a visit date and time, \
collect name, phone and address, choose the payment method, then call finalize_booking. \
Per-square-meter services require at least {} meters. Electronic payment earns a {}% discount \
and requires a {}% advance plus an uploaded payment proof. Available time slots: {}. \
Use the tools for every data-backed answer and keep replies short and friendly.\n\nCatalog:\n{}",
        state.config.minimum_area,
        state.config.electronic_discount_percent,
        state.config.advance_payment_percent,
        state.config.booking_time_slots.join(", "),
        services,
    )
}

fn tool_definitions() -> Vec<Value> {
    let cart_schema = json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "service_id": { "type": "string" },
                "quantity": { "type": ["string", "number"] }
            },
            "required": ["service_id"]
        }
    });

    let mut tools = vec![
        json!({
            "type": "function",
            "function": {
                "name": "list_services",
                "description": "List the offerable services with prices and pricing types.",
                "parameters": { "type": "object", "properties": {} }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "compute_quote",
                "description": "Price a cart of selected services and return the quote.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "services": cart_schema,
                        "payment_method": { "type": "string", "enum": ["cash", "electronic"] }
                    },
                    "required": ["services"]
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "finalize_booking",
                "description": "Create the booking once every required detail is collected.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "services": cart_schema,
                        "payment_method": { "type": "string", "enum": ["cash", "electronic"] },
                        "customer_name": { "type": "string" },
                        "phone": { "type": "string" },
                        "address": { "type": "string" },
                        "date": { "type": "string", "description": "Visit date, YYYY-MM-DD" },
                        "time": { "type": "string", "description": "Visit time slot, HH:MM" },
                        "notes": { "type": "string" },
                        "email": { "type": "string" }
                    },
                    "required": ["services", "customer_name", "phone", "address", "date", "time"]
                }
            }
        }),
    ];

    for ui_tool in UI_TOOLS {
        tools.push(json!({
            "type": "function",
            "function": {
                "name": ui_tool,
                "description": format!("Ask the client app to render the '{ui_tool}' widget."),
                "parameters": { "type": "object", "properties": {} }
            }
        }));
    }
    tools
}

async fn execute_tool(
    state: &AppState,
    tool_name: &str,
    arguments: &Map<String, Value>,
    booking_result: &mut Option<Value>,
    ui_action: &mut Option<String>,
) -> AppResult<Value> {
    if UI_TOOLS.contains(&tool_name) {
        *ui_action = Some(tool_name.to_string());
        return Ok(json!({ "ok": true, "widget": tool_name }));
    }

    match tool_name {
        "list_services" => {
            let catalog = catalog::load_catalog(state).await?;
            let services = catalog
                .iter()
                .map(|service| {
                    json!({
                        "id": service.id,
                        "name": service.name,
                        "pricing_type": service.pricing_type,
                        "unit_price": service.unit_price,
                        "unit_label": service.pricing_type.unit_label(),
                    })
                })
                .collect::<Vec<_>>();
            Ok(json!({ "ok": true, "services": services }))
        }
        "compute_quote" => {
            let items = build_cart(state, arguments).await?;
            let payment_method = parse_payment_method(arguments);
            let quote = pricing::compute_quote(
                &items,
                payment_method,
                state.config.electronic_discount_rate(),
                state.config.advance_payment_rate(),
            );
            Ok(json!({ "ok": true, "items": items, "quote": quote }))
        }
        "finalize_booking" => {
            let input: CreateBookingInput =
                serde_json::from_value(Value::Object(arguments.clone())).map_err(|error| {
                    AppError::BadRequest(format!("Invalid booking details: {error}"))
                })?;
            let created = booking::create_booking_from_input(state, &input).await?;
            let invoice_text = invoice::render_invoice(&created);
            let whatsapp_url = whatsapp::share_link(&state.config, &invoice_text);

            let result = json!({
                "booking": booking::booking_response_value(&created),
                "invoice_text": invoice_text,
                "whatsapp_url": whatsapp_url,
            });
            *booking_result = Some(result);
            Ok(json!({
                "ok": true,
                "booking_id": created.booking_id,
                "final_price": created.final_price,
            }))
        }
        _ => Err(AppError::BadRequest(format!("Unknown tool '{tool_name}'."))),
    }
}

async fn build_cart(state: &AppState, arguments: &Map<String, Value>) -> AppResult<Vec<LineItem>> {
    let catalog = catalog::load_catalog(state).await?;
    let lines: Vec<crate::schemas::LineItemInput> = arguments
        .get("services")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|error| AppError::BadRequest(format!("Invalid cart payload: {error}")))?
        .unwrap_or_default();

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        let item = pricing::add_service(
            &catalog,
            &items,
            &line.service_id,
            &line.raw_quantity(),
            state.config.minimum_area,
        )?;
        items.push(item);
    }
    Ok(items)
}

fn parse_payment_method(arguments: &Map<String, Value>) -> PaymentMethod {
    arguments
        .get("payment_method")
        .and_then(Value::as_str)
        .and_then(|raw| serde_json::from_value(Value::String(raw.to_string())).ok())
        .unwrap_or(PaymentMethod::Cash)
}

async fn call_chat_completion(
    state: &AppState,
    messages: &[Value],
    tools: &[Value],
) -> AppResult<(Value, String, bool)> {
    let api_key = state
        .config
        .openai_api_key
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::ServiceUnavailable(
                "OPENAI_API_KEY is missing. Configure it in backend environment variables."
                    .to_string(),
            )
        })?;

    let model_chain = state.config.openai_model_chain();
    if model_chain.is_empty() {
        return Err(AppError::ServiceUnavailable(
            "No assistant model is configured.".to_string(),
        ));
    }

    let mut fallback_used = false;
    for (index, model_name) in model_chain.iter().enumerate() {
        let mut payload = Map::new();
        payload.insert("model".to_string(), Value::String(model_name.clone()));
        payload.insert("messages".to_string(), Value::Array(messages.to_vec()));
        payload.insert("temperature".to_string(), Value::from(0.2));
        if !tools.is_empty() {
            payload.insert("tools".to_string(), Value::Array(tools.to_vec()));
            payload.insert("tool_choice".to_string(), Value::String("auto".to_string()));
        }

        let response = match state
            .http_client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .timeout(std::time::Duration::from_secs(
                state.config.assistant_timeout_seconds,
            ))
            .json(&payload)
            .send()
            .await
        {
            Ok(value) => value,
            Err(error) => {
                tracing::error!(error = %error, model = %model_name, "AI provider is unreachable");
                if index < model_chain.len() - 1 {
                    fallback_used = true;
                    continue;
                }
                return Err(AppError::Dependency(
                    "AI provider is unreachable.".to_string(),
                ));
            }
        };

        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            tracing::warn!(model = %model_name, status = %status, "AI provider request failed");
            if index < model_chain.len() - 1 {
                fallback_used = true;
                continue;
            }
            let detail = if state.config.is_production() {
                "AI provider request failed.".to_string()
            } else {
                format!("AI provider request failed ({status}): {}", body_text.trim())
            };
            return Err(AppError::Dependency(detail));
        }

        let completion: Value = serde_json::from_str(&body_text).map_err(|_| {
            AppError::Dependency("AI provider returned an unreadable response.".to_string())
        })?;
        return Ok((completion, model_name.clone(), fallback_used));
    }

    Err(AppError::Dependency(
        "AI provider is unreachable.".to_string(),
    ))
}

fn parse_tool_arguments(raw: Option<&Value>) -> AppResult<Map<String, Value>> {
    match raw {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(Value::String(text)) => {
            if text.trim().is_empty() {
                return Ok(Map::new());
            }
            serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|value| value.as_object().cloned())
                .ok_or_else(|| {
                    AppError::BadRequest("Tool arguments are not a JSON object.".to_string())
                })
        }
        Some(_) => Err(AppError::BadRequest(
            "Tool arguments are not a JSON object.".to_string(),
        )),
    }
}

fn extract_content_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| {
                part.get("text")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

fn build_reply(
    reply: String,
    tool_trace: Vec<Value>,
    booking_result: Option<Value>,
    ui_action: Option<String>,
    model_used: String,
    fallback_used: bool,
) -> Map<String, Value> {
    let mut result = Map::new();
    result.insert("reply".to_string(), Value::String(reply));
    result.insert("tool_trace".to_string(), Value::Array(tool_trace));
    if let Some(booking) = booking_result {
        result.insert("booking_result".to_string(), booking);
    }
    if let Some(widget) = ui_action {
        result.insert("ui_action".to_string(), Value::String(widget));
    }
    result.insert("model_used".to_string(), Value::String(model_used));
    result.insert("fallback_used".to_string(), Value::Bool(fallback_used));
    result
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{extract_content_text, parse_tool_arguments, truncate_chars};

    #[test]
    fn tool_arguments_accept_object_or_json_string() {
        let from_object = parse_tool_arguments(Some(&json!({"service_id": "a"}))).unwrap();
        assert_eq!(from_object.get("service_id").unwrap(), "a");

        let from_string =
            parse_tool_arguments(Some(&json!("{\"service_id\": \"b\"}"))).unwrap();
        assert_eq!(from_string.get("service_id").unwrap(), "b");

        assert!(parse_tool_arguments(Some(&json!("not json"))).is_err());
        assert!(parse_tool_arguments(None).unwrap().is_empty());
    }

    #[test]
    fn content_text_handles_string_and_part_arrays() {
        assert_eq!(extract_content_text(Some(&json!(" hello "))), "hello");
        let parts = json!([
            {"type": "text", "text": "first"},
            {"type": "text", "text": "second"}
        ]);
        assert_eq!(extract_content_text(Some(&parts)), "first\nsecond");
        assert_eq!(extract_content_text(None), "");
    }

    #[test]
    fn truncation_is_character_safe() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 3), "ab");
    }
}
