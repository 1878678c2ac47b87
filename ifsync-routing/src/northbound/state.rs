//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use ifsync_northbound::error::Error;
use ifsync_northbound::state::Provider;
use ifsync_utils::ip::AddressFamily;

use crate::Master;
use crate::rib::Rib;

// ===== impl Master =====

impl Provider for Master {
    type Snapshot = Rib;

    fn list(&mut self, name: Option<&str>) -> Result<Vec<Rib>, Error> {
        let mut kernel = self
            .southbound
            .open()
            .map_err(|error| Error::SessionInit(error.reason()))?;
        let names = kernel
            .links()
            .map_err(|error| Error::Resolution(error.reason()))?
            .into_iter()
            .map(|link| (link.ifindex, link.name))
            .collect::<BTreeMap<_, _>>();

        let mut ribs = vec![];
        for af in [AddressFamily::Ipv4, AddressFamily::Ipv6] {
            let routes = kernel
                .routes(af)
                .map_err(|error| Error::Resolution(error.reason()))?;
            ribs.extend(Rib::from_kernel(af, &routes, &names));
        }
        ribs.retain(|rib| name.is_none_or(|name| rib.name == name));
        Ok(ribs)
    }
}
