//
// Copyright (c) The ripd Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod builder;
pub mod debug;
pub mod error;
pub mod instance;
pub mod neighbor;
pub mod network;
pub mod packet;
pub mod processor;
pub mod route;
pub mod tasks;
