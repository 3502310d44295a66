// src/lib.rs

// 1. Data Structures (The "Nouns")
// explicit 'pub' makes them available to main.rs
pub mod models;
pub mod events;
pub mod errors;
pub mod math;

// 2. Interfaces (The "Contract")
pub mod traits;

// 3. Collaborators (The "World")
pub mod simulation;

// 4. Adapters (The "Plumbing")
pub mod connectors;

// 5. Fund State (The "Ledger")
pub mod vault;
pub mod comptroller;

// 6. Extensions (The "Rules")
pub mod fees;
pub mod policies;
pub mod integrations;

// 7. Protocol (The "Orchestrator")
pub mod engine;

// 8. Scripted Runs
pub mod config;
pub mod scenario;
