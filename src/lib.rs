//! # docqa
//!
//! Incremental document ingestion and conversational question answering over
//! a local vector index.
//!
//! docqa walks a library directory, extracts text from plain, office and PDF
//! files (running OCR over embedded images), normalizes and chunks it, drops
//! duplicate chunks, and adds only unseen content to a persisted index. At
//! question time a follow-up is rewritten into a standalone question, the
//! nearest chunks are retrieved, and a language model refines its answer over
//! them one chunk at a time.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ Library  │──▶│ Extract + OCR    │──▶│ Normalize +  │
//! │ (files)  │   │ DOCX/PDF/PPTX/.. │   │ Chunk+Dedup  │
//! └──────────┘   └──────────────────┘   └──────┬───────┘
//!                                              ▼
//!                ┌──────────────────┐   ┌──────────────┐
//!  question ────▶│ Rewrite+Retrieve │◀──│ Vector index │
//!  + history     │ + Refine loop    │   │ (SQLite)     │
//!                └────────┬─────────┘   └──────────────┘
//!                         ▼
//!                  ┌─────────────┐
//!                  │ CLI / HTTP  │
//!                  └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa ingest --dry-run        # show what would be ingested
//! docqa ingest                  # ingest and update the index
//! docqa chat                    # interactive questions
//! docqa serve                   # POST /ask on [server].bind
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`error`] | Typed capability and index errors |
//! | [`http`] | JSON POST with retry for remote services |
//! | [`models`] | Core data types |
//! | [`extract`] | Format dispatch and text/image extraction |
//! | [`ocr`] | OCR engine abstraction |
//! | [`normalize`] | OCR, office and plain text cleanup |
//! | [`chunk`] | Recursive splitting, fingerprints, dedup |
//! | [`record`] | Persisted set of ingested files |
//! | [`ingest`] | Ingestion pipeline |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector index abstraction and backends |
//! | [`index`] | Incremental index maintenance |
//! | [`llm`] | Language model abstraction |
//! | [`prompts`] | Built-in prompt templates |
//! | [`history`] | Bounded chat history |
//! | [`retriever`] | Query embedding and top-k lookup |
//! | [`chain`] | Rewrite, retrieve and refine |
//! | [`app`] | Component wiring |
//! | [`cli`] | Interactive question loop |
//! | [`server`] | HTTP server |

pub mod app;
pub mod chain;
pub mod chunk;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod history;
pub mod http;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod prompts;
pub mod record;
pub mod retriever;
pub mod server;
pub mod store;
