// Copyright 2025 LambdaGate Authors
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

//! # LambdaGate CLI
//!
//! Command-line interface for the LambdaGate function gateway.
//!
//! ## Key Commands
//!
//! - `lambdagate serve`: start the HTTP server (function admin API, route
//!   admin API and the dynamic routes)
//! - `lambdagate invoke`: run one function from the function store and print
//!   its JSON result
//!
//! ## Environment
//!
//! Flags take precedence over these variables:
//!
//! - `LAMBDAGATE_FUNCTIONS_DIR`: function store directory (default `./lambdas`)
//! - `LAMBDAGATE_ROUTES_FILE`: persisted route table (default `./routes.json`)
//! - `LAMBDAGATE_INSTALLER`: installer command line (default `npm install`)
//! - `RUST_LOG`: log filter (default `info`)

pub mod settings;
