use tracing::{debug, trace};

use crate::args::BuildArgs;
use crate::error::Error;
use crate::images::ImageRegistry;
use crate::label;
use crate::lines::{Instruction, InstructionKind, logical_lines};
use crate::model::{Layer, SimplifiedDockerfile, Stage, WaitFor, WaitForKind, stage_index};
use crate::options::{copy_from, mount_from};

impl SimplifiedDockerfile {
    pub fn parse(content: &[u8], max_label_length: usize) -> Result<Self, Error> {
        label::validate_max_length(max_label_length)?;
        let instructions = logical_lines(content)?;

        let mut builder = Builder::new(max_label_length);
        for instruction in &instructions {
            builder.push(instruction);
        }
        Ok(builder.finish())
    }
}

pub fn parse_dockerfile(
    content: &[u8],
    max_label_length: usize,
) -> Result<SimplifiedDockerfile, Error> {
    SimplifiedDockerfile::parse(content, max_label_length)
}

enum BuildState {
    BeforeFirstStage,
    InStage(Stage),
}

struct Builder {
    max_label_length: usize,
    args: BuildArgs,
    images: ImageRegistry,
    state: BuildState,
    stages: Vec<Stage>,
    before_first_stage: Vec<Layer>,
}

impl Builder {
    fn new(max_label_length: usize) -> Self {
        Self {
            max_label_length,
            args: BuildArgs::new(),
            images: ImageRegistry::new(),
            state: BuildState::BeforeFirstStage,
            stages: Vec::new(),
            before_first_stage: Vec::new(),
        }
    }

    fn push(&mut self, instruction: &Instruction) {
        trace!(
            line = instruction.start_line,
            keyword = instruction.keyword(),
            "instruction"
        );

        match &instruction.kind {
            InstructionKind::From { image, alias } => {
                self.open_stage(instruction, image, alias.as_deref());
                return;
            }
            InstructionKind::Arg(declarations) => {
                for declaration in declarations {
                    self.args
                        .declare(&declaration.name, declaration.default.as_deref());
                }
            }
            InstructionKind::Copy | InstructionKind::Run | InstructionKind::Other(_) => {}
        }

        let label = label::truncate(&instruction.text, self.max_label_length);
        let BuildState::InStage(stage) = &mut self.state else {
            self.before_first_stage.push(Layer::new(label));
            return;
        };

        let wait_for = match instruction.kind {
            InstructionKind::Copy => copy_from(&instruction.text)
                .map(|reference| WaitFor::new(reference, WaitForKind::Copy)),
            InstructionKind::Run => mount_from(&instruction.text)
                .map(|reference| WaitFor::new(reference, WaitForKind::Mount)),
            _ => None,
        };
        if let Some(wait_for) = &wait_for {
            // `--from=<n>` names an earlier stage by position
            if stage_index(&wait_for.name, self.stages.len()).is_none() {
                self.images.record(&wait_for.name);
            }
        }
        stage.layers.push(Layer { label, wait_for });
    }

    fn open_stage(&mut self, instruction: &Instruction, image: &str, alias: Option<&str>) {
        let image = self.args.substitute(image);
        let name = alias.map(|alias| self.args.substitute(alias));
        let text = self.args.substitute(&instruction.text);
        self.images.record(&image);

        let first_layer = Layer::waiting_for(
            label::truncate(&text, self.max_label_length),
            WaitFor::new(image, WaitForKind::From),
        );
        let stage = Stage {
            name,
            layers: vec![first_layer],
        };

        if let BuildState::InStage(previous) =
            std::mem::replace(&mut self.state, BuildState::InStage(stage))
        {
            self.stages.push(previous);
        }
        debug!(
            index = self.stages.len(),
            line = instruction.start_line,
            end_line = instruction.end_line,
            "opened stage"
        );
    }

    fn finish(mut self) -> SimplifiedDockerfile {
        if let BuildState::InStage(stage) = self.state {
            self.stages.push(stage);
        }

        let external_images = self.images.finish(&self.stages);
        debug!(
            stages = self.stages.len(),
            external_images = external_images.len(),
            "parsed dockerfile"
        );

        SimplifiedDockerfile {
            external_images,
            stages: self.stages,
            before_first_stage: self.before_first_stage,
        }
    }
}
