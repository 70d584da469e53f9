/// Kind of human interface device exposed to the guest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Pointing,
    Keyboard,
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VirtioInput {
    #[serde(rename = "inputType")]
    pub input_type: InputType,
}

impl VirtioInput {
    pub fn new(input_type: InputType) -> VirtioInput {
        VirtioInput { input_type }
    }
}
