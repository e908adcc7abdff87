use colored::*;
use grpc_codec_core::{
    Message,
    prost_reflect::{MethodDescriptor, ServiceDescriptor},
};
use std::path::PathBuf;

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct ServiceList(pub Vec<String>);

pub struct UnpackedFiles(pub Vec<PathBuf>);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<Message> for FormattedString {
    fn from(message: Message) -> Self {
        FormattedString(
            serde_json::to_string_pretty(&message).unwrap_or_else(|_| format!("{message:?}")),
        )
    }
}

impl From<anyhow::Error> for FormattedString {
    fn from(err: anyhow::Error) -> Self {
        let mut out = format!("{}\n\n'{}'", "Error:".red().bold(), err);
        for cause in err.chain().skip(1) {
            out.push_str(&format!("\n  {} {}", "caused by:".yellow(), cause));
        }
        FormattedString(out)
    }
}

impl From<ServiceList> for FormattedString {
    fn from(ServiceList(services): ServiceList) -> Self {
        if services.is_empty() {
            return FormattedString("No services found.".yellow().to_string());
        }

        let mut out = String::new();
        out.push_str("Available Services:\n");
        for svc in services {
            out.push_str(&format!("  - {}\n", svc.green()));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<UnpackedFiles> for FormattedString {
    fn from(UnpackedFiles(files): UnpackedFiles) -> Self {
        if files.is_empty() {
            return FormattedString("Archive contained no files.".yellow().to_string());
        }

        let mut out = String::new();
        out.push_str("Unpacked Files:\n");
        for file in files {
            out.push_str(&format!("  - {}\n", file.display().to_string().green()));
        }
        FormattedString(out.trim_end().to_string())
    }
}

impl From<ServiceDescriptor> for FormattedString {
    fn from(service: ServiceDescriptor) -> Self {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {{\n",
            "service".cyan(),
            service.full_name().green()
        ));

        for method in service.methods() {
            out.push_str("  ");
            let method_fmt = FormattedString::from(method);
            out.push_str(&method_fmt.0);
            out.push('\n');
        }
        out.push('}');
        FormattedString(out)
    }
}

impl From<MethodDescriptor> for FormattedString {
    fn from(method: MethodDescriptor) -> Self {
        let stream = |enabled: bool| {
            if enabled {
                format!("{} ", "stream".cyan())
            } else {
                "".to_string()
            }
        };

        FormattedString(format!(
            "{} {}({}{}) {} ({}{});",
            "rpc".cyan(),
            method.name().green(),
            stream(method.is_client_streaming()),
            method.input().full_name().yellow(),
            "returns".cyan(),
            stream(method.is_server_streaming()),
            method.output().full_name().yellow()
        ))
    }
}
