//! Example: Budget report for a few models plus one assembled request
//!
//! Run with an optional config file, and `--json` to dump the assembled
//! context: `cargo run --example context_report -- context.toml --json`

use context_budget::context::{format_token_count, has_extended_context};
use context_budget::observability::init_tracing;
use context_budget::prelude::*;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let json = args.iter().any(|a| a == "--json");
    let config = match args.iter().find(|a| !a.starts_with("--")) {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    init_tracing(&config.logging)?;

    let assembler = config.assembler()?;

    println!(
        "{:<12} {:<22} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "provider", "model", "total", "system", "memory", "summary", "recent", "reserve"
    );
    for (provider, model) in [
        (Provider::Anthropic, "claude-3-5-sonnet"),
        (Provider::OpenAi, "gpt-4o"),
        (Provider::Google, "gemini-1.5-pro"),
        (Provider::Ollama, "llama3"),
        (Provider::Ollama, "phi3"),
        (Provider::from_id("somebody-new"), "mystery-model"),
    ] {
        let budget = assembler.budget(provider, model);
        println!(
            "{:<12} {:<22} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}{}",
            provider.as_str(),
            model,
            format_token_count(budget.total_limit),
            format_token_count(budget.system_prompt_budget),
            format_token_count(budget.memory_budget),
            format_token_count(budget.summary_budget),
            format_token_count(budget.recent_messages_budget),
            format_token_count(budget.response_reserve),
            if has_extended_context(provider, model) { "  (extended)" } else { "" }
        );
    }

    let character = Character {
        name: "Wren".to_string(),
        description: "A cartographer mapping a coastline that keeps changing.".to_string(),
        personality: "Meticulous, wry, easily distracted by birds.".to_string(),
        scenario: "{{user}} has hired {{char}} to chart the northern cliffs.".to_string(),
        ..Character::new("Wren")
    };
    let persona = Persona::new("Ash");
    let memories = vec![
        ScoredMemory::new("Ash gets seasick on small boats.", 0.7, 0.9),
        ScoredMemory::new("Ash paid half the fee up front.", 0.4, 0.6),
    ];
    let history: Vec<ChatMessage> = (0..80)
        .map(|i| {
            if i % 2 == 0 {
                ChatMessage::user(format!(
                    "Day {}: what did the cliffs look like this morning?",
                    i / 2
                ))
            } else {
                ChatMessage::assistant(format!(
                    "Day {}: fog, then a collapse near the eastern stack.",
                    i / 2
                ))
            }
        })
        .collect();

    let request = AssemblyRequest::new(Provider::Ollama, "llama3", &character)
        .with_persona(&persona)
        .with_memories(&memories)
        .with_summary("Wren and Ash have surveyed half the coast.")
        .with_messages(&history);
    let context = assembler.assemble(&request);

    println!();
    println!(
        "Assembled {} of {} messages, {} memories, {} tokens in total",
        context.messages.len(),
        history.len(),
        context.memories.memories_used,
        format_token_count(context.usage.total())
    );
    println!(
        "Status: {} ({}%) {}",
        context.status.level.as_str(),
        context.status.percent_used,
        context.status.message
    );
    println!("Summarize: {}", context.should_summarize);

    if json {
        println!();
        println!("{}", serde_json::to_string_pretty(&context)?);
    }

    println!();
    print!("{}", context_budget::metrics::METRICS.export_prometheus());

    Ok(())
}
