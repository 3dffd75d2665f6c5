//! Default AEM Compose hooks and configuration.

use crate::config::InstanceScript;

/// Where the AEM Compose CLI wrapper is downloaded from.
pub const AEMW_URL: &str = "https://raw.githubusercontent.com/wttech/aemc/main/pkg/project/common/aemw";

/// Baseline `aem.yml`: one local author and one local publish instance.
pub const CONFIG_YML: &str = r#"instance:
  config:
    local_author:
      active: true
      http_url: http://127.0.0.1:4502
      user: admin
      password: admin
      run_modes: [local]
      jvm_opts:
        - -server -Djava.awt.headless=true
    local_publish:
      active: true
      http_url: http://127.0.0.1:4503
      user: admin
      password: admin
      run_modes: [local]
      jvm_opts:
        - -server -Djava.awt.headless=true

  check:
    await_started:
      timeout: 30m
    await_stopped:
      timeout: 10m

java:
  download:
    skip: true
"#;

pub fn create_script() -> InstanceScript {
    InstanceScript::inline(["sh aemw instance init", "sh aemw instance create"])
}

pub fn launch_script() -> InstanceScript {
    InstanceScript::inline([
        "sh aemw osgi config save --pid 'org.apache.sling.jcr.davex.impl.servlets.SlingDavExServlet' --input-string 'alias: /crx/server'",
        r#"sh aemw repl agent setup -A --location 'author' --name 'publish' --input-string '{enabled: true, transportUri: "http://localhost:4503/bin/receive?sling:authRequestLogin=1", transportUser: admin, transportPassword: admin, userId: admin}'"#,
    ])
}

pub fn delete_script() -> InstanceScript {
    InstanceScript::inline(["sh aemw instance delete"])
}
