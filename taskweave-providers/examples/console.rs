//! Console walkthrough of the kernel against a live OpenAI or Azure service
//!
//! Run with: cargo run --example console
//!
//! Reads `settings.json` from the working directory (optional) and the
//! `OPENAI_*` environment variables. Set `SKILLS_DIR` to import prompt skills
//! from disk; a `Power` skill there is used by the last pipeline.

use std::sync::Arc;

use anyhow::Result;
use taskweave_core::logging::init_from_config;
use taskweave_core::prelude::*;
use taskweave_core::skills::math::AMOUNT_VAR;
use taskweave_providers::{build_services, HttpConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = KernelConfig::load("settings.json")?;
    init_from_config(&config.logging)?;

    let mut registry = SkillRegistry::new();
    registry.register(PromptSkill::new("Console", "Echo", "Send the input as the prompt", "{{$input}}")?)?;
    registry.register(PromptSkill::new("Console", "Square", "Square the input", "({{$input}})^2=")?)?;
    registry.register_all(MathSkill::skills())?;
    if let Ok(dir) = std::env::var("SKILLS_DIR") {
        let added = taskweave_core::skills::import_prompt_skills(&mut registry, &dir, "Skills").await?;
        info!(added, dir = %dir, "Imported directory skills");
    }

    let services = build_services(&config, &HttpConfig::default())?;
    let kernel = Kernel::from_config(Arc::new(registry), services.clone(), &config);

    // Chained prompt skills: the first answer is squared by the second
    let out = kernel
        .run("4+4=", &[SkillKey::new("Console", "Echo"), SkillKey::new("Console", "Square")])
        .await?;
    println!("(4+4)^2 = {}", out.trim());

    // Native skills read the amount from the context
    let mut context = ExecutionContext::new("10").with_variable(AMOUNT_VAR, "3");
    let out = kernel.invoke(&SkillKey::new("Math", "Subtract"), &mut context).await?;
    println!("10 - 3 = {}", out);

    if kernel.registry().contains("Skills", "Power") {
        let out = kernel
            .run("5+5", &[SkillKey::new("Console", "Echo"), SkillKey::new("Skills", "Power")])
            .await?;
        println!("(5+5)^2 = {}", out.trim());
    }

    // Template chat over the text backend
    let bot = ConversationBot::new(services.text.clone())?;
    for turn in ["6+6=", "<previous>-2=", "<previous>*3="] {
        let answer = bot.ask(turn).await?;
        println!("Human: {}\nAI: {}", turn, answer.trim());
    }

    // Chat backend with streaming
    if let Ok(chat) = kernel.chat() {
        let mut history = ChatHistory::with_system("You are a terse calculator.");
        history.add_user("What is 7*6?");
        history
            .stream_reply(chat, &CompletionOptions::default(), |chunk| print!("{}", chunk))
            .await?;
        println!();
    }

    // Semantic memory, when an embedding service is configured
    if let Ok(memory) = kernel.memory() {
        memory.save("facts", "capital", "Paris is the capital of France").await?;
        memory.save("facts", "pet", "My dog is called Rex").await?;
        for hit in memory.search("facts", "What is my dog's name?", 1).await? {
            println!("memory: {} ({:.2})", hit.text, hit.relevance);
        }
    }

    // Plan generation and execution
    let goal = "Add 5 to the input, then square the result";
    let mut plan = kernel.create_plan(goal).await?;
    for (index, step) in plan.steps().iter().enumerate() {
        println!("step {}: {}", index, step.skill);
    }
    let mut context = ExecutionContext::new("2");
    let out = kernel
        .execute_plan(&mut plan, &mut context, &CancellationToken::new())
        .await?;
    println!("{} -> {}", goal, out.trim());

    Ok(())
}
