pub mod antigravity;
pub mod codex;
pub mod custom;
pub mod kiro;
