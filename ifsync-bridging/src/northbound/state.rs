//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ifsync_northbound::error::Error;
use ifsync_northbound::state::Provider;
use ifsync_utils::southbound::LinkKind;

use crate::Master;
use crate::bridge::Component;

// ===== impl Master =====

impl Provider for Master {
    type Snapshot = Component;

    fn list(&mut self, name: Option<&str>) -> Result<Vec<Component>, Error> {
        let mut kernel = self
            .southbound
            .open()
            .map_err(|error| Error::SessionInit(error.reason()))?;
        let links = kernel
            .links()
            .map_err(|error| Error::Resolution(error.reason()))?;

        let components = links
            .iter()
            .filter(|link| link.kind == Some(LinkKind::Bridge))
            .filter(|link| name.is_none_or(|name| link.name == name))
            .map(|bridge| Component::from_kernel(bridge, &links))
            .collect();
        Ok(components)
    }
}
