use std::collections::VecDeque;

use async_trait::async_trait;
use futures::future::join_all;

use crate::semantics::{ArgValue, ClassifiedCommand, ParameterSpec, ValueCategory};
use crate::services::DeviceHandle;

use super::context::{confused, done, reset, ContextCore, DialogueContext, Turn, FAIL_REPLY};
use super::default::DefaultContext;

/// Parameter elicitation and execution for one invocable action: resolve a
/// concrete device, fill the remaining schema turn by turn, confirm, and fan
/// the invocation out to every resolved device.
pub struct ActionContext {
    core: ContextCore,
    kind: Option<String>,
    channel: String,
    schema: VecDeque<ParameterSpec>,
    devices: Vec<DeviceHandle>,
    resolving: Vec<DeviceHandle>,
    current_param: Option<(String, ValueCategory)>,
    resolved_args: Vec<ArgValue>,
    confirming: bool,
    direct_exec: bool,
}

impl ActionContext {
    pub fn new(direct_exec: bool) -> Self {
        Self {
            core: ContextCore::default(),
            kind: None,
            channel: String::new(),
            schema: VecDeque::new(),
            devices: Vec::new(),
            resolving: Vec::new(),
            current_param: None,
            resolved_args: Vec::new(),
            confirming: false,
            direct_exec,
        }
    }

    /// Resolve which physical devices the action targets. Returns true when
    /// the turn ends here (no device, or the user has to pick one).
    fn resolve_devices(&mut self, turn: &mut Turn) -> bool {
        let kind = self.kind.clone().unwrap_or_default();
        let devices = turn.services.devices.devices_of_kind(&kind);

        match devices.len() {
            0 => {
                turn.reply(format!("You don't have a {}", kind));
                turn.replace(Box::new(DefaultContext::new()));
                true
            }
            1 => {
                self.devices = devices;
                false
            }
            _ => {
                turn.reply(format!("You have multiple {}s", kind));
                let mut question = String::from("Do you mean ");
                for (i, device) in devices.iter().enumerate() {
                    if i > 0 {
                        question.push_str(" or ");
                    }
                    question.push_str(&format!("{}) {}", i + 1, device.name));
                }
                question.push('?');
                self.resolving = devices;
                self.core.ask(turn, ValueCategory::Number, &question)
            }
        }
    }

    /// Interpret a numeric answer as a 1-based pick among the candidates.
    /// Returns true when it had to ask again.
    fn handle_pick(&mut self, value: f64, turn: &mut Turn) -> bool {
        let count = self.resolving.len();
        if value.fract() != 0.0 || value < 1.0 || value > count as f64 {
            turn.reply(format!("Please choose a number between 1 and {}", count));
            return true;
        }
        let chosen = self.resolving[value as usize - 1].clone();
        turn.reply(format!("You chose {}", chosen.name));
        self.devices = vec![chosen];
        self.resolving.clear();
        self.core.satisfied(turn);
        false
    }

    /// Bind constants and supplied inputs, then ask for the next missing
    /// parameter. Returns true when a question went out.
    fn next_parameter(&mut self, inputs: &mut VecDeque<ArgValue>, turn: &mut Turn) -> bool {
        if let Some((question, category)) = self.current_param.clone() {
            match inputs.pop_front() {
                Some(value) => {
                    self.resolved_args.push(value);
                    self.current_param = None;
                    self.core.satisfied(turn);
                }
                // Re-ask the open question; no new side effects.
                None => return self.core.ask(turn, category, &question),
            }
        }

        while let Some(param) = self.schema.pop_front() {
            match param {
                ParameterSpec::Constant { value } => self.resolved_args.push(value),
                ParameterSpec::Input { question, category } => {
                    if let Some(value) = inputs.pop_front() {
                        self.resolved_args.push(value);
                    } else {
                        self.current_param = Some((question.clone(), category));
                        return self.core.ask(turn, category, &question);
                    }
                }
            }
        }
        false
    }

    fn describe(&self) -> String {
        let mut out = format!("{} {}", self.kind.as_deref().unwrap_or(""), self.channel);
        for arg in &self.resolved_args {
            out.push(' ');
            out.push_str(&arg.to_string());
        }
        out
    }

    async fn advance(&mut self, mut inputs: VecDeque<ArgValue>, turn: &mut Turn) -> bool {
        if self.next_parameter(&mut inputs, turn) {
            return true;
        }

        if !self.direct_exec {
            return false;
        }

        if self.confirming {
            if inputs.len() != 1 {
                turn.reply(FAIL_REPLY);
                return true;
            }
            match inputs.pop_front() {
                Some(ArgValue::Bool(true)) => self.execute(turn).await,
                Some(ArgValue::Bool(false)) => reset(turn),
                _ => {
                    turn.reply(FAIL_REPLY);
                    true
                }
            }
        } else {
            self.confirming = true;
            let question = format!("Ok, so you want me to {}. Is that right?", self.describe());
            self.core.ask(turn, ValueCategory::YesNo, &question)
        }
    }

    /// Invoke every resolved device concurrently and wait for all of them;
    /// the group succeeds or fails together, surfacing the first failure.
    async fn execute(&mut self, turn: &mut Turn) -> bool {
        let channel = self.channel.clone();
        let args = self.resolved_args.clone();

        let invocations: Vec<_> = self
            .devices
            .iter()
            .map(|device| {
                tracing::info!(device = %device.id, channel = %channel, "executing action");
                turn.services.devices.invoke(&device.id, &channel, &args)
            })
            .collect();
        let results = join_all(invocations).await;

        if let Some(err) = results.into_iter().find_map(|result| result.err()) {
            tracing::warn!(error = %err, "action execution failed");
            turn.reply(format!("Sorry, that did not work: {}", err));
            turn.replace(Box::new(DefaultContext::new()));
            return true;
        }
        done(turn)
    }
}

#[async_trait]
impl DialogueContext for ActionContext {
    fn name(&self) -> &'static str {
        "ActionContext"
    }

    fn core(&mut self) -> &mut ContextCore {
        &mut self.core
    }

    fn core_ref(&self) -> &ContextCore {
        &self.core
    }

    async fn handle(&mut self, command: &ClassifiedCommand, turn: &mut Turn) -> bool {
        if self.handle_generic(command, turn).await {
            return true;
        }

        let mut inputs: VecDeque<ArgValue> = VecDeque::new();

        if self.kind.is_none() {
            let ClassifiedCommand::Action(action) = command else {
                return confused(turn);
            };
            self.kind = Some(action.kind.clone());
            self.channel = action.channel.clone();
            self.schema = action.schema.iter().cloned().collect();
            inputs = action.params.iter().cloned().collect();
            if self.resolve_devices(turn) {
                return true;
            }
        } else if matches!(command, ClassifiedCommand::Action(_)) {
            turn.reply("You already told me what to do");
            return true;
        } else if self.devices.is_empty()
            && self.current_param.is_none()
            && self.core.expecting == Some(ValueCategory::Number)
        {
            // Device pick; generic handling guarantees a numeric value here.
            match command {
                ClassifiedCommand::Value(_, ArgValue::Number(n)) => {
                    if self.handle_pick(*n, turn) {
                        return true;
                    }
                }
                _ => return confused(turn),
            }
        } else {
            inputs = match command {
                ClassifiedCommand::Value(_, value) => VecDeque::from([value.clone()]),
                ClassifiedCommand::Affirm => VecDeque::from([ArgValue::Bool(true)]),
                ClassifiedCommand::Deny => VecDeque::from([ArgValue::Bool(false)]),
                _ => VecDeque::new(),
            };
        }

        self.advance(inputs, turn).await
    }

    async fn handle_raw(&mut self, raw: &str, turn: &mut Turn) -> bool {
        if self.current_param.is_some() && self.core.expecting == Some(ValueCategory::RawString) {
            self.resolved_args.push(ArgValue::Text(raw.to_string()));
            self.current_param = None;
            self.core.satisfied(turn);
            return self.advance(VecDeque::new(), turn).await;
        }
        if let Some(child) = self.core.child.as_mut() {
            return child.handle_raw(raw, turn).await;
        }
        confused(turn)
    }
}
