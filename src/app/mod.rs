// Copyright 2024 Felix Engl
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod args;
mod commands;
pub mod logging;

pub use args::{prepare_instruction, Command, ErigoneArgs, Instruction};
pub use commands::execute;

/// Loads the configs, configures the logging and executes the command.
pub fn exec_args(args: ErigoneArgs) -> anyhow::Result<()> {
    let instruction = prepare_instruction(args)?;
    if !matches!(instruction.command, Command::Init) {
        logging::configure_logging(&instruction.configs, &instruction.data_root)?;
    }
    log::debug!("Execute {:?}", instruction.command);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&instruction, &mut out)
}
