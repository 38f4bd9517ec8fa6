use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use magtile_session::{Reply, Status};
use magtile_transport::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ReplyOutput<'a> {
    command: &'a str,
    #[serde(flatten)]
    reply: &'a Reply,
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    product: Option<&'a str>,
}

fn status_str(status: Status) -> &'static str {
    match status {
        Status::Success => "success",
        Status::Error => "error",
    }
}

pub fn render_reply(command: &str, reply: &Reply, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string(&ReplyOutput { command, reply }).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "STATUS", "DATA"])
                .add_row(vec![
                    command.to_string(),
                    status_str(reply.status).to_string(),
                    reply.data.clone(),
                ]);
            table.to_string()
        }
        OutputFormat::Pretty => {
            format!("{command}: {} {}", status_str(reply.status), reply.data)
                .trim_end()
                .to_string()
        }
    }
}

pub fn print_reply(command: &str, reply: &Reply, format: OutputFormat) {
    println!("{}", render_reply(command, reply, format));
}

pub fn render_ports(ports: &[PortInfo], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = ports
                .iter()
                .map(|port| PortOutput {
                    name: &port.name,
                    kind: port.kind.as_str(),
                    product: port.product.as_deref(),
                })
                .collect();
            serde_json::to_string(&out).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "KIND", "PRODUCT"]);
            for port in ports {
                table.add_row(vec![
                    port.name.clone(),
                    port.kind.as_str().to_string(),
                    port.product.clone().unwrap_or_default(),
                ]);
            }
            table.to_string()
        }
        OutputFormat::Pretty => ports
            .iter()
            .map(|port| match &port.product {
                Some(product) => format!("{} ({}, {product})", port.name, port.kind.as_str()),
                None => format!("{} ({})", port.name, port.kind.as_str()),
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    let rendered = render_ports(ports, format);
    if !rendered.is_empty() {
        println!("{rendered}");
    }
}
