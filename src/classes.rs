//! Label set for the mango leaf classifier
//!
//! The order matches the output units of the trained network.

/// Number of output classes
pub const NUM_CLASSES: usize = 8;

/// Class names, indexed by output unit
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "Anthracnose",
    "Bacterial Canker",
    "Cutting Weevil",
    "Die Back",
    "Gall Midge",
    "Healthy",
    "Powdery Mildew",
    "Sooty Mould",
];

/// Get the class name for a given label index
pub fn class_name(label: usize) -> Option<&'static str> {
    CLASS_NAMES.get(label).copied()
}

/// Check if a class represents a healthy leaf
pub fn is_healthy_class(label: usize) -> bool {
    class_name(label) == Some("Healthy")
}
