//! System prompt for the AI path

use crate::tools::ToolSchema;

/// Build the routing prompt from the registered tools and caller hints
pub fn build_system_prompt(tools: &[ToolSchema], hints: &[String]) -> String {
    let tool_lines = tools
        .iter()
        .map(|t| format!("{} – {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n- ");

    let mut prompt = format!(
        r#"You are the command interpreter of a personal finance assistant.

Users write short Indonesian messages about their money, e.g.
"beli kopi 25rb", "gaji 5jt", "budget makanan 1 juta", "isi saldo gopay 100k".

Available tools:
- {}

Amount notation:
- rb / ribu / k = thousand, jt / juta = million, miliar = billion
- "1,5jt" is 1500000, "25.000" is 25000
- x, @, kali and per mean multiply

Rules:
- Call EXACTLY ONE tool when the message asks for a financial action
- Pass amounts as plain numbers in rupiah
- Never invent tools that are not listed
- If the message is not a financial action, answer briefly without calling a tool
- If you cannot call functions, reply with ONLY this JSON:
  {{ "tool": "<tool name>", "arguments": {{ ... }} }}
"#,
        tool_lines
    );

    if !hints.is_empty() {
        prompt.push_str("\nContext:\n- ");
        prompt.push_str(&hints.join("\n- "));
        prompt.push('\n');
    }

    prompt
}
