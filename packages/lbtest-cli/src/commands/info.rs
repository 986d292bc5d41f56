use crate::cli::InfoArgs;
use crate::exit_codes;
use crate::output;
use crate::run_params::{resolve_sim_root, tool_programs};
use lbtest_rs::config::CONFIGURATIONS;
use serde::Serialize;

#[derive(Serialize)]
struct ToolInfo {
    role: &'static str,
    program: String,
    resolved_path: Option<String>,
    found: bool,
}

#[derive(Serialize)]
struct InfoOutput {
    cli_version: String,
    platform: String,
    arch: String,
    sim_root: String,
    sim_root_found: bool,
    tool_name: String,
    configurations: Vec<&'static str>,
    tools: Vec<ToolInfo>,
}

pub fn execute(args: InfoArgs) -> i32 {
    let sim_root = resolve_sim_root(&args.tools.sim_root);

    let tools = tool_programs(&args.tools)
        .into_iter()
        .map(|(role, program)| {
            let resolved = which::which(program).ok();
            ToolInfo {
                role,
                program: program.to_string(),
                found: resolved.is_some(),
                resolved_path: resolved.map(|p| p.display().to_string()),
            }
        })
        .collect();

    let info = InfoOutput {
        cli_version: env!("CARGO_PKG_VERSION").to_string(),
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        sim_root: match &sim_root {
            Ok(path) => path.display().to_string(),
            Err(_) => args.tools.sim_root.clone(),
        },
        sim_root_found: sim_root.is_ok(),
        tool_name: args.tools.tool_name.clone(),
        configurations: CONFIGURATIONS.to_vec(),
        tools,
    };

    if args.json {
        let written = output::to_json(&info).and_then(|json| output::write_output(&json, None));
        if let Err(e) = written {
            eprintln!("Error: {}", e);
            return exit_codes::FATAL_ERROR;
        }
        return exit_codes::SUCCESS;
    }

    println!("lbtest CLI v{}", info.cli_version);
    println!("Platform: {} ({})", info.platform, info.arch);
    println!();
    if info.sim_root_found {
        println!("Simulator root: {}", info.sim_root);
    } else {
        println!("Simulator root: {} (not found)", info.sim_root);
    }
    println!(
        "Executables: {}-<{}>-<build>-<compiler>",
        info.tool_name,
        info.configurations.join("|")
    );
    for tool in &info.tools {
        match &tool.resolved_path {
            Some(path) => println!("{}: {} ({})", tool.role, tool.program, path),
            None => println!("{}: {} (not found)", tool.role, tool.program),
        }
    }

    exit_codes::SUCCESS
}
