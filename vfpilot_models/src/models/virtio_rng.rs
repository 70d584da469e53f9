/// virtio-rng entropy source. Carries no configuration.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VirtioRng {}

impl VirtioRng {
    pub fn new() -> VirtioRng {
        VirtioRng {}
    }
}
