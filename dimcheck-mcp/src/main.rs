//! Dimcheck MCP Server
//!
//! MCP Server for protocol revision 2025-11-25
//!
//! Tools:
//! - check_units: Check a unit against `=`-separated target units
//! - parse_unit: Parse a unit expression into base units and exponents
//! - validate_targets: Parse a target unit list
//! - validate_part: Validate the unit settings of a question part
//! - list_rules: List the conversion rule presets

use dimcheck_core::DimError;
use dimcheck_units::{
    parse_target_list, parse_unit, validate_part, PartUnits, RuleRegistry, UnitChecker,
};
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const PROTOCOL_VERSION: &str = "2025-11-25";
const SERVER_NAME: &str = "dimcheck";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server settings read from the environment at startup
#[derive(Debug, Clone, Default)]
struct Config {
    presets_path: Option<PathBuf>,
}

impl Config {
    fn from_env() -> Self {
        Config {
            presets_path: env::var_os("DIMCHECK_PRESETS_PATH").map(PathBuf::from),
        }
    }

    /// Built-in presets plus the site presets file, if it loads cleanly
    fn registry(&self) -> RuleRegistry {
        let Some(path) = &self.presets_path else {
            return RuleRegistry::builtin();
        };

        let loaded = fs::read_to_string(path)
            .map_err(|e| DimError::invalid_preset(format!("cannot read {}: {}", path.display(), e)))
            .and_then(|json| RuleRegistry::builtin().with_site_presets_json(&json).map_err(DimError::from));

        match loaded {
            Ok(registry) => {
                info!(path = %path.display(), presets = registry.len(), "loaded rule presets");
                registry
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring site presets");
                RuleRegistry::builtin()
            }
        }
    }
}

// MCP Protocol types
#[derive(Debug, Deserialize)]
struct McpRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    id: Option<JsonValue>,
    method: String,
    #[serde(default)]
    params: Option<JsonValue>,
}

#[derive(Debug, Serialize)]
struct McpResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<McpError>,
}

#[derive(Debug, Serialize)]
struct McpError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<JsonValue>,
}

impl McpError {
    fn invalid_params(message: impl Into<String>) -> Self {
        McpError { code: -32602, message: message.into(), data: None }
    }
}

impl McpResponse {
    fn parse_error(message: String) -> Self {
        McpResponse {
            jsonrpc: "2.0".to_string(),
            id: None,
            result: None,
            error: Some(McpError { code: -32700, message, data: None }),
        }
    }
}

/// Registry of presets plus the grading session shared by all calls
struct Server {
    registry: RuleRegistry,
    checker: UnitChecker,
}

impl Server {
    fn new(registry: RuleRegistry) -> Self {
        Server { registry, checker: UnitChecker::new() }
    }

    /// Handle one input line, returning the JSON reply to write, if any
    fn handle_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let request: McpRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "error parsing request");
                let response = McpResponse::parse_error(format!("Parse error: {}", e));
                return Some(to_json_line(&response));
            }
        };

        debug!(method = %request.method, "processing");
        let response = self.handle_request(&request);

        // Notifications (no id) should NOT receive a response
        if request.id.is_none() {
            debug!(method = %request.method, "notification processed");
            return None;
        }

        Some(to_json_line(&response))
    }

    fn handle_request(&mut self, request: &McpRequest) -> McpResponse {
        let result = match request.method.as_str() {
            // Lifecycle
            "initialize" => handle_initialize(&request.params),
            "initialized" => Ok(json!({})),
            "ping" => Ok(json!({})),

            // Tools
            "tools/list" => handle_tools_list(),
            "tools/call" => self.handle_tool_call(&request.params),

            _ => Err(McpError {
                code: -32601,
                message: format!("Method not found: {}", request.method),
                data: None,
            }),
        };

        match result {
            Ok(r) => McpResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id.clone(),
                result: Some(r),
                error: None,
            },
            Err(e) => McpResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id.clone(),
                result: None,
                error: Some(e),
            },
        }
    }

    fn handle_tool_call(&mut self, params: &Option<JsonValue>) -> Result<JsonValue, McpError> {
        let params = params.as_ref()
            .ok_or_else(|| McpError::invalid_params("Missing params"))?;

        let name = params.get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| McpError::invalid_params("Missing tool name"))?;

        let args = params.get("arguments").cloned().unwrap_or(json!({}));
        debug!(tool = name, "tool call");

        match name {
            "check_units" => self.tool_check_units(&args),
            "parse_unit" => tool_parse_unit(&args),
            "validate_targets" => tool_validate_targets(&args),
            "validate_part" => self.tool_validate_part(&args),
            "list_rules" => self.tool_list_rules(),
            _ => Err(McpError::invalid_params(format!("Unknown tool: {}", name))),
        }
    }

    fn tool_check_units(&mut self, args: &JsonValue) -> Result<JsonValue, McpError> {
        let unit = str_arg(args, "unit")?;
        let targets = str_arg(args, "targets")?;
        let rule_id = rule_id_arg(args)?;
        let rules = args.get("rules").and_then(|v| v.as_str()).unwrap_or("");

        let Some(preset) = self.registry.get(rule_id) else {
            return Ok(tool_error(&DimError::unknown_rule_id(rule_id).in_field("rule_id")));
        };

        // Only touch the rules that changed so compiled layers are reused
        self.checker.assign_default_rules(preset.id, &preset.rules);
        if self.checker.index().additional_rules() != rules {
            self.checker.assign_additional_rules(rules);
        }

        // Compile up front so a rule error names the preset or the question rules
        if let Err(err) = self.checker.ensure_compiled().map(|_| ()) {
            let field = if self.checker.index().is_default_compiled() { "rules" } else { "rule_id" };
            return Ok(tool_error(&DimError::from(err).in_field(field)));
        }

        match self.checker.check_convertibility(unit, targets) {
            Ok(verdict) => {
                let text = match verdict.target {
                    Some(i) if verdict.convertible => {
                        format!("'{}' converts to target {} with factor {}", unit, i, verdict.factor)
                    }
                    _ => format!("'{}' does not convert to any of '{}'", unit, targets),
                };
                Ok(json!({
                    "content": [{ "type": "text", "text": text }],
                    "data": verdict,
                    "isError": false
                }))
            }
            Err(err) => Ok(tool_error(&DimError::from(err))),
        }
    }

    fn tool_validate_part(&self, args: &JsonValue) -> Result<JsonValue, McpError> {
        let part = PartUnits {
            rule_id: rule_id_arg(args)?,
            additional_rules: args.get("rules").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            targets: args.get("targets").and_then(|v| v.as_str()).unwrap_or("").to_string(),
        };

        let errors = validate_part(&self.registry, &part);
        let text = if errors.is_empty() {
            "Unit settings are valid".to_string()
        } else {
            errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n")
        };

        Ok(json!({
            "content": [{ "type": "text", "text": text }],
            "data": errors,
            "isError": !errors.is_empty()
        }))
    }

    fn tool_list_rules(&self) -> Result<JsonValue, McpError> {
        let presets: Vec<_> = self.registry.presets().collect();
        let text = presets.iter()
            .map(|p| format!("{}: {}", p.id, p.name))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(json!({ "content": [{ "type": "text", "text": text }], "data": presets }))
    }
}

fn tool_parse_unit(args: &JsonValue) -> Result<JsonValue, McpError> {
    let unit = str_arg(args, "unit")?;
    match parse_unit(unit) {
        Ok(vector) => Ok(json!({
            "content": [{ "type": "text", "text": vector.to_string() }],
            "data": vector,
            "isError": false
        })),
        Err(err) => Ok(tool_error(&DimError::from(err).in_field("unit"))),
    }
}

fn tool_validate_targets(args: &JsonValue) -> Result<JsonValue, McpError> {
    let targets = str_arg(args, "targets")?;
    match parse_target_list(targets) {
        Ok(list) => {
            let text = list.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(" = ");
            Ok(json!({
                "content": [{ "type": "text", "text": text }],
                "data": list,
                "isError": false
            }))
        }
        Err(err) => Ok(tool_error(&DimError::from(err).in_field("targets"))),
    }
}

fn tool_error(err: &DimError) -> JsonValue {
    json!({
        "content": [{ "type": "text", "text": err.to_string() }],
        "data": err,
        "isError": true
    })
}

fn str_arg<'a>(args: &'a JsonValue, name: &str) -> Result<&'a str, McpError> {
    args.get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| McpError::invalid_params(format!("Missing {} argument", name)))
}

fn rule_id_arg(args: &JsonValue) -> Result<u32, McpError> {
    match args.get("rule_id") {
        None | Some(JsonValue::Null) => Ok(0),
        Some(v) => v.as_u64()
            .and_then(|id| u32::try_from(id).ok())
            .ok_or_else(|| McpError::invalid_params("rule_id must be a non-negative integer")),
    }
}

fn handle_initialize(params: &Option<JsonValue>) -> Result<JsonValue, McpError> {
    let client_info = params.as_ref()
        .and_then(|p| p.get("clientInfo"))
        .and_then(|c| c.get("name"))
        .and_then(|n| n.as_str())
        .unwrap_or("unknown");

    // Use client's protocol version for compatibility
    let client_protocol = params.as_ref()
        .and_then(|p| p.get("protocolVersion"))
        .and_then(|v| v.as_str())
        .unwrap_or(PROTOCOL_VERSION);

    info!(client = client_info, protocol = client_protocol, "client connected");

    Ok(json!({
        "protocolVersion": client_protocol,
        "serverInfo": {
            "name": SERVER_NAME,
            "version": SERVER_VERSION,
            "description": "Unit checking for physics answers"
        },
        "capabilities": {
            "tools": {
                "listChanged": false
            }
        },
        "instructions": "Dimcheck compares answer units against accepted target units. Targets are '='-separated unit expressions such as 'J = N m = kg m^2/s^2'. Conversion rules come from a preset ('list_rules') plus optional question rules such as 'm: k c; 2.54 cm = inch'."
    }))
}

fn handle_tools_list() -> Result<JsonValue, McpError> {
    Ok(json!({
        "tools": [
            {
                "name": "check_units",
                "description": "Check whether a unit converts to one of the target units. Returns the matched target and the factor that converts a value in the given unit to it.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "unit": {
                            "type": "string",
                            "description": "Unit expression, e.g. 'km/h'"
                        },
                        "targets": {
                            "type": "string",
                            "description": "Accepted units separated by '=', e.g. 'J = N m'"
                        },
                        "rule_id": {
                            "type": "integer",
                            "description": "Conversion rule preset (default: 0, no rules)",
                            "default": 0
                        },
                        "rules": {
                            "type": "string",
                            "description": "Additional conversion rules, e.g. 'm: k c; 2.54 cm = inch'"
                        }
                    },
                    "required": ["unit", "targets"]
                }
            },
            {
                "name": "parse_unit",
                "description": "Parse a unit expression into base units with integer exponents.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "unit": {
                            "type": "string",
                            "description": "Unit expression, e.g. 'kg m^2/s^2'"
                        }
                    },
                    "required": ["unit"]
                }
            },
            {
                "name": "validate_targets",
                "description": "Parse an '='-separated list of target units.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "targets": {
                            "type": "string",
                            "description": "Accepted units separated by '='"
                        }
                    },
                    "required": ["targets"]
                }
            },
            {
                "name": "validate_part",
                "description": "Validate the unit settings of a question part and list every problem found.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "rule_id": {
                            "type": "integer",
                            "description": "Conversion rule preset (default: 0)"
                        },
                        "rules": {
                            "type": "string",
                            "description": "Additional conversion rules"
                        },
                        "targets": {
                            "type": "string",
                            "description": "Accepted units separated by '='"
                        }
                    }
                }
            },
            {
                "name": "list_rules",
                "description": "List the available conversion rule presets.",
                "inputSchema": {
                    "type": "object",
                    "properties": {}
                }
            }
        ]
    }))
}

fn to_json_line(response: &McpResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        let err = DimError::internal(format!("cannot serialize response: {}", e));
        warn!(error = %err, "failed to serialize response");
        json!({
            "jsonrpc": "2.0",
            "id": response.id,
            "error": { "code": -32603, "message": err.message }
        }).to_string()
    })
}

fn write_line(line: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", line)?;
    stdout.flush()
}

fn main() {
    // Logs go to stderr; stdout carries the protocol
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let mut server = Server::new(config.registry());

    info!(version = SERVER_VERSION, protocol = PROTOCOL_VERSION, "dimcheck MCP server started");
    info!(presets = server.registry.len(), "server ready, waiting for requests");

    let stdin = io::stdin();
    let mut reader = io::BufReader::new(stdin.lock());

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => {
                info!("client disconnected (EOF)");
                break;
            }
            Ok(_) => {
                let Some(reply) = server.handle_line(&line) else {
                    continue;
                };
                if let Err(e) = write_line(&reply) {
                    warn!(error = %e, "error writing response");
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, "error reading input");
                break;
            }
        }
    }

    info!("server shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, params: JsonValue) -> McpRequest {
        McpRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: method.to_string(),
            params: Some(params),
        }
    }

    fn call(server: &mut Server, tool: &str, arguments: JsonValue) -> JsonValue {
        let response = server.handle_request(&request("tools/call", json!({ "name": tool, "arguments": arguments })));
        assert!(response.error.is_none());
        response.result.unwrap()
    }

    #[test]
    fn test_malformed_line_gets_parse_error() {
        let mut server = Server::new(RuleRegistry::builtin());
        let reply = server.handle_line("{\"jsonrpc\": \"2.0\", \"id\": 1,").unwrap();
        let reply: JsonValue = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["error"]["code"], -32700);
        assert!(reply.get("id").is_none());
        assert!(reply.get("result").is_none());
    }

    #[test]
    fn test_notification_gets_no_reply() {
        let mut server = Server::new(RuleRegistry::builtin());
        assert!(server.handle_line(r#"{"jsonrpc": "2.0", "method": "initialized"}"#).is_none());
        assert!(server.handle_line("   ").is_none());
    }

    #[test]
    fn test_request_line_gets_reply() {
        let mut server = Server::new(RuleRegistry::builtin());
        let reply = server.handle_line(r#"{"jsonrpc": "2.0", "id": 7, "method": "ping"}"#).unwrap();
        let reply: JsonValue = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["id"], 7);
        assert_eq!(reply["result"], json!({}));
    }

    #[test]
    fn test_unknown_method() {
        let mut server = Server::new(RuleRegistry::builtin());
        let response = server.handle_request(&request("resources/list", json!({})));
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[test]
    fn test_tools_list() {
        let mut server = Server::new(RuleRegistry::builtin());
        let result = server.handle_request(&request("tools/list", json!({}))).result.unwrap();
        let names: Vec<&str> = result["tools"].as_array().unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["check_units", "parse_unit", "validate_targets", "validate_part", "list_rules"]);
    }

    #[test]
    fn test_check_units() {
        let mut server = Server::new(RuleRegistry::builtin());
        let result = call(&mut server, "check_units", json!({ "unit": "cm", "targets": "m", "rule_id": 1 }));
        assert_eq!(result["isError"], false);
        assert_eq!(result["data"]["convertible"], true);
        assert_eq!(result["data"]["target"], 0);
        assert!((result["data"]["factor"].as_f64().unwrap() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_check_units_reuses_session() {
        let mut server = Server::new(RuleRegistry::builtin());
        call(&mut server, "check_units", json!({ "unit": "cm", "targets": "m", "rule_id": 1 }));
        assert!(server.checker.index().is_compiled());
        call(&mut server, "check_units", json!({ "unit": "km", "targets": "m", "rule_id": 1 }));
        assert!(server.checker.index().is_compiled());
    }

    #[test]
    fn test_check_units_reports_rule_errors() {
        let mut server = Server::new(RuleRegistry::builtin());
        let result = call(&mut server, "check_units", json!({ "unit": "m", "targets": "m", "rules": "m: Q" }));
        assert_eq!(result["isError"], true);
        assert_eq!(result["data"]["code"], dimcheck_core::codes::UNKNOWN_PREFIX);
        assert_eq!(result["data"]["context"]["field"], "rules");

        let result = call(&mut server, "check_units", json!({ "unit": "m", "targets": "m", "rule_id": 5 }));
        assert_eq!(result["data"]["code"], dimcheck_core::codes::UNKNOWN_RULE_ID);
    }

    #[test]
    fn test_check_units_rule_error_field() {
        let mut registry = RuleRegistry::builtin();
        registry.add_site_preset(dimcheck_units::RulePreset::new(100, "lengths", "m: k")).unwrap();
        let mut server = Server::new(registry);

        // A bad question rule is reported against the question rules
        let result = call(&mut server, "check_units", json!({ "unit": "km", "targets": "m", "rule_id": 100, "rules": "s: Q" }));
        assert_eq!(result["data"]["context"]["field"], "rules");

        // and fixing it reuses the compiled preset
        let result = call(&mut server, "check_units", json!({ "unit": "km", "targets": "m", "rule_id": 100 }));
        assert_eq!(result["data"]["convertible"], true);
        assert!(server.checker.index().is_default_compiled());
    }

    #[test]
    fn test_parse_unit() {
        let mut server = Server::new(RuleRegistry::builtin());
        let result = call(&mut server, "parse_unit", json!({ "unit": "kg m^2/s^2" }));
        assert_eq!(result["data"], json!([
            { "unit": "kg", "exponent": 1 },
            { "unit": "m", "exponent": 2 },
            { "unit": "s", "exponent": -2 }
        ]));

        let result = call(&mut server, "parse_unit", json!({ "unit": "m/s/s" }));
        assert_eq!(result["isError"], true);
    }

    #[test]
    fn test_validate_part() {
        let mut server = Server::new(RuleRegistry::builtin());
        let result = call(&mut server, "validate_part", json!({ "rule_id": 9, "targets": "m =" }));
        assert_eq!(result["isError"], true);
        assert_eq!(result["data"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_argument() {
        let mut server = Server::new(RuleRegistry::builtin());
        let response = server.handle_request(&request("tools/call", json!({ "name": "parse_unit" })));
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[test]
    fn test_list_rules() {
        let mut server = Server::new(RuleRegistry::builtin());
        let result = call(&mut server, "list_rules", json!({}));
        assert_eq!(result["data"][1]["id"], 1);
        assert_eq!(result["data"][1]["name"], "Common SI units");
    }

    #[test]
    fn test_bad_presets_file_falls_back() {
        let config = Config { presets_path: Some(PathBuf::from("/nonexistent/presets.json")) };
        assert_eq!(config.registry().len(), 2);
    }
}
